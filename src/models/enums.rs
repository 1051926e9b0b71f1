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

str_enum!(Diagnosis {
    Hernia => "Hernia",
    SinHernia => "Sin Hernia",
});

impl Diagnosis {
    /// Map a raw model class token to the stored diagnosis. The negative
    /// class token is the only one mapped to `SinHernia`; every other token
    /// counts as a positive finding.
    pub fn from_class_token(token: &str) -> Self {
        if token == Self::SinHernia.as_str() {
            Self::SinHernia
        } else {
            Self::Hernia
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Self::SinHernia)
    }
}
