use chrono::{DateTime, Months, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Partner dates are sent without offset, in the beneficiary's local time
pub const PARTNER_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Objects older than this are not taken into account
const RECOVERY_MONTHS_BEFORE: u32 = 12;
/// Objects further away than this are not taken into account
const RECOVERY_MONTHS_AFTER: u32 = 24;

pub mod appointment_status {
    pub const CANCELLED: &str = "Annulé";
    pub const POSTPONED: &str = "Reporté";
    pub const ABSENT: &str = "Absent";
    pub const UNSPECIFIED: &str = "Non précisé";
    pub const PLANNED: &str = "Planifié";
    pub const PRESENT: &str = "Présent";
    pub const DONE: &str = "Réalisé";
}

pub mod session_status {
    pub const PRESCRIBED: &str = "Prescrit";
    pub const REFUSED_BY_THIRD_PARTY: &str = "Refus tiers";
    pub const REFUSED_BY_BENEFICIARY: &str = "Refus jeune";
    pub const DONE: &str = "Réalisé";
}

pub fn parse_partner_date(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let local = NaiveDateTime::parse_from_str(raw.trim(), PARTNER_DATE_FORMAT).ok()?;
    tz.from_local_datetime(&local)
        .earliest()
        .map(|date| date.with_timezone(&Utc))
}

/// True when `date` is strictly inside `]now - 1 year, now + 2 years[`
pub fn is_within_recovery_window(date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let lower = now.checked_sub_months(Months::new(RECOVERY_MONTHS_BEFORE));
    let upper = now.checked_add_months(Months::new(RECOVERY_MONTHS_AFTER));
    match (lower, upper) {
        (Some(lower), Some(upper)) => date > lower && date < upper,
        _ => false,
    }
}

/// Rules shared by every kind of object the partner owns
pub trait PartnerObject {
    /// Statuses for which the object is ignored or removed locally
    const NON_RECOVERABLE_STATUSES: &'static [&'static str];
    /// Statuses for which beneficiaries are notified of changes
    const NOTIFIABLE_STATUSES: &'static [&'static str];

    fn status(&self) -> &str;

    fn raw_start(&self) -> &str;

    fn start_date(&self, tz: &Tz) -> Option<DateTime<Utc>> {
        parse_partner_date(self.raw_start(), tz)
    }

    fn is_status_recoverable(&self) -> bool {
        !Self::NON_RECOVERABLE_STATUSES.contains(&self.status())
    }

    fn is_status_notifiable(&self) -> bool {
        Self::NOTIFIABLE_STATUSES.contains(&self.status())
    }

    /// An object with an unreadable date is never recoverable
    fn is_date_recoverable(&self, tz: &Tz, now: DateTime<Utc>) -> bool {
        self.start_date(tz)
            .map(|date| is_within_recovery_window(date, now))
            .unwrap_or(false)
    }

    fn is_recoverable(&self, tz: &Tz, now: DateTime<Utc>) -> bool {
        self.is_status_recoverable() && self.is_date_recoverable(tz, now)
    }

    fn is_upcoming(&self, tz: &Tz, now: DateTime<Utc>) -> bool {
        self.start_date(tz).map(|date| date > now).unwrap_or(false)
    }
}

/// Partner view of an individual appointment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerAppointment {
    pub id: String,
    pub beneficiary_partner_id: String,
    pub starts_at: String,
    pub ends_at: Option<String>,
    pub title: String,
    pub comment: Option<String>,
    pub location: Option<String>,
    pub modality: Option<String>,
    pub status: String,
}

impl PartnerAppointment {
    /// Zero when the end is missing or unreadable
    pub fn duration_minutes(&self, tz: &Tz) -> i64 {
        let end = self
            .ends_at
            .as_deref()
            .and_then(|raw| parse_partner_date(raw, tz));
        match (self.start_date(tz), end) {
            (Some(start), Some(end)) if end > start => (end - start).num_minutes(),
            _ => 0,
        }
    }
}

impl PartnerObject for PartnerAppointment {
    const NON_RECOVERABLE_STATUSES: &'static [&'static str] =
        &[appointment_status::CANCELLED, appointment_status::POSTPONED];
    const NOTIFIABLE_STATUSES: &'static [&'static str] = &[
        appointment_status::ABSENT,
        appointment_status::UNSPECIFIED,
        appointment_status::PLANNED,
        appointment_status::PRESENT,
    ];

    fn status(&self) -> &str {
        &self.status
    }

    fn raw_start(&self) -> &str {
        &self.starts_at
    }
}

/// Partner view of a beneficiary's enrollment in one occurrence of a training session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerSessionInstance {
    pub id: String,
    pub session_id: String,
    pub beneficiary_partner_id: String,
    pub starts_at: String,
    pub ends_at: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub comment: Option<String>,
    pub status: String,
}

impl PartnerObject for PartnerSessionInstance {
    const NON_RECOVERABLE_STATUSES: &'static [&'static str] = &[
        session_status::REFUSED_BY_THIRD_PARTY,
        session_status::REFUSED_BY_BENEFICIARY,
    ];
    const NOTIFIABLE_STATUSES: &'static [&'static str] = &[session_status::PRESCRIBED];

    fn status(&self) -> &str {
        &self.status
    }

    fn raw_start(&self) -> &str {
        &self.starts_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use chrono_tz::{America::Guadeloupe, Europe::Paris};

    fn appointment(starts_at: &str, status: &str) -> PartnerAppointment {
        PartnerAppointment {
            id: "1".into(),
            beneficiary_partner_id: "123456".into(),
            starts_at: starts_at.into(),
            ends_at: Some("2022-10-06 11:43:00".into()),
            title: "Bilan".into(),
            comment: None,
            location: None,
            modality: None,
            status: status.into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn partner_dates_are_read_in_the_beneficiary_zone() {
        let raw = "2022-10-06 10:07:00";
        assert_eq!(
            parse_partner_date(raw, &Guadeloupe),
            Some(Utc.with_ymd_and_hms(2022, 10, 6, 14, 7, 0).unwrap())
        );
        assert_eq!(
            parse_partner_date(raw, &Paris),
            Some(Utc.with_ymd_and_hms(2022, 10, 6, 8, 7, 0).unwrap())
        );
        assert_eq!(parse_partner_date("06/10/2022", &Paris), None);
    }

    #[test]
    fn recovery_window_boundaries() {
        let now = now();
        let one_year_ago = now.checked_sub_months(Months::new(12)).unwrap();
        let in_two_years = now.checked_add_months(Months::new(24)).unwrap();

        assert!(!is_within_recovery_window(one_year_ago - Duration::days(1), now));
        assert!(is_within_recovery_window(one_year_ago + Duration::days(1), now));
        assert!(is_within_recovery_window(in_two_years - Duration::days(1), now));
        assert!(!is_within_recovery_window(in_two_years + Duration::days(1), now));
    }

    #[test]
    fn duration_is_computed_from_the_end_date() {
        let mut rdv = appointment("2022-10-06 10:07:00", appointment_status::PLANNED);
        assert_eq!(rdv.duration_minutes(&Paris), 96);

        rdv.ends_at = None;
        assert_eq!(rdv.duration_minutes(&Paris), 0);
    }

    #[test]
    fn appointment_status_tables() {
        let cancelled = appointment("2023-03-20 10:00:00", appointment_status::CANCELLED);
        assert!(!cancelled.is_recoverable(&Paris, now()));

        let done = appointment("2023-03-20 10:00:00", appointment_status::DONE);
        assert!(done.is_recoverable(&Paris, now()));
        assert!(!done.is_status_notifiable());

        let planned = appointment("2023-03-20 10:00:00", appointment_status::PLANNED);
        assert!(planned.is_status_notifiable());
        assert!(planned.is_upcoming(&Paris, now()));
    }

    #[test]
    fn unreadable_dates_are_not_recoverable() {
        let rdv = appointment("not a date", appointment_status::PLANNED);
        assert!(!rdv.is_recoverable(&Paris, now()));
        assert!(!rdv.is_upcoming(&Paris, now()));
    }

    #[test]
    fn session_status_tables() {
        let instance = |status: &str| PartnerSessionInstance {
            id: "34".into(),
            session_id: "7".into(),
            beneficiary_partner_id: "123456".into(),
            starts_at: "2023-04-01 09:00:00".into(),
            ends_at: None,
            name: None,
            location: None,
            comment: None,
            status: status.into(),
        };
        assert!(instance(session_status::PRESCRIBED).is_status_notifiable());
        assert!(!instance(session_status::REFUSED_BY_BENEFICIARY).is_recoverable(&Paris, now()));
        assert!(!instance(session_status::REFUSED_BY_THIRD_PARTY).is_status_recoverable());
        assert!(instance(appointment_status::ABSENT).is_status_recoverable());
        assert!(!instance(appointment_status::ABSENT).is_status_notifiable());
    }
}
