use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Staff attribution for walk-in signups. Validated at the boundary; unknown
/// values are rejected rather than silently dropped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StaffMember {
    FrontDesk,
    Hygiene,
    Treatment,
    OfficeManager,
}

impl std::fmt::Display for StaffMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaffMember::FrontDesk => write!(f, "front_desk"),
            StaffMember::Hygiene => write!(f, "hygiene"),
            StaffMember::Treatment => write!(f, "treatment"),
            StaffMember::OfficeManager => write!(f, "office_manager"),
        }
    }
}

impl std::str::FromStr for StaffMember {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "front_desk" => Ok(StaffMember::FrontDesk),
            "hygiene" => Ok(StaffMember::Hygiene),
            "treatment" => Ok(StaffMember::Treatment),
            "office_manager" => Ok(StaffMember::OfficeManager),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round_trip() {
        for staff in [
            StaffMember::FrontDesk,
            StaffMember::Hygiene,
            StaffMember::Treatment,
            StaffMember::OfficeManager,
        ] {
            assert_eq!(StaffMember::from_str(&staff.to_string()), Ok(staff));
        }
    }

    #[test]
    fn test_unknown_value_rejected() {
        assert!(StaffMember::from_str("Dr. Smith").is_err());
        assert!(StaffMember::from_str("").is_err());
    }
}
