use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdvisorId(pub i64);

impl fmt::Display for AdvisorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisor {
    pub id: AdvisorId,
    pub first_name: String,
    pub second_name: Option<String>,
    pub first_last_name: String,
    pub second_last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

impl Advisor {
    /// Name used to address the advisor in notifications: given names followed
    /// by the first last name, skipping blanks.
    pub fn display_name(&self) -> String {
        [Some(self.first_name.as_str()), self.second_name.as_deref(), Some(&self.first_last_name)]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::{Advisor, AdvisorId};

    fn advisor(second_name: Option<&str>) -> Advisor {
        Advisor {
            id: AdvisorId(3),
            first_name: "Laura".to_string(),
            second_name: second_name.map(str::to_string),
            first_last_name: "Gomez".to_string(),
            second_last_name: Some("Rios".to_string()),
            email: "laura.gomez@example.com".to_string(),
            phone: None,
        }
    }

    #[test]
    fn display_name_includes_second_name_when_present() {
        assert_eq!(advisor(Some("Maria")).display_name(), "Laura Maria Gomez");
    }

    #[test]
    fn display_name_skips_missing_or_blank_second_name() {
        assert_eq!(advisor(None).display_name(), "Laura Gomez");
        assert_eq!(advisor(Some("  ")).display_name(), "Laura Gomez");
    }
}
