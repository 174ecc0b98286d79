use crate::observability::audit::events;
use crate::submission::record::SubmissionRecord;
use chrono::NaiveDateTime;

const SECS_PER_DAY: i64 = 86_400;

/// `Late Submission: {days} days, {hours:.2} hours` when `submitted_at` is
/// after `due`; `None` for on-time (including exactly-on-time) submissions
pub fn lateness_note(submitted_at: NaiveDateTime, due: NaiveDateTime) -> Option<String> {
    if submitted_at <= due {
        return None;
    }
    let late_secs = (submitted_at - due).num_seconds();
    let days = late_secs / SECS_PER_DAY;
    let hours = (late_secs % SECS_PER_DAY) as f64 / 3600.0;
    Some(format!("Late Submission: {} days, {:.2} hours", days, hours))
}

/// Append a lateness note to every late record
pub fn mark_late(records: &mut [SubmissionRecord], due: NaiveDateTime) -> usize {
    let mut late = 0;
    for record in records.iter_mut() {
        if let Some(note) = lateness_note(record.submitted_at(), due) {
            events::late_submission(record.handle(), &note);
            record.add_note(note);
            late += 1;
        }
    }
    late
}
