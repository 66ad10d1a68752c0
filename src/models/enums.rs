use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(HospitalizationStatus {
    Active => "active",
    Discharged => "discharged",
    Cancelled => "cancelled",
    Deceased => "deceased",
});

str_enum!(DoseStatus {
    Pending => "pending",
    Late => "late",
    Done => "done",
    Skipped => "skipped",
});

impl DoseStatus {
    /// A dose can only be acted on (recorded, rescheduled) before it reaches
    /// a terminal state.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Late)
    }
}
