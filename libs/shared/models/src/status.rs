use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

string_enum!(QueueStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Done => "DONE",
    Error => "ERROR",
});

impl QueueStatus {
    /// Same-state updates are accepted so that retried requests stay idempotent.
    pub fn can_transition_to(&self, target: &QueueStatus) -> bool {
        use QueueStatus::*;
        if self == target {
            return true;
        }
        match (self, target) {
            (Pending, Processing) => true,
            (Pending, Error) => true,
            (Processing, Done) => true,
            (Processing, Error) => true,
            (Processing, Pending) => true,
            (Error, Pending) => true,
            _ => false,
        }
    }
}

string_enum!(PendingStatus {
    Pending => "PENDING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

string_enum!(VmStatus {
    Healthy => "HEALTHY",
    Unhealthy => "UNHEALTHY",
    Idle => "IDLE",
});

string_enum!(AlertSeverity {
    Info => "INFO",
    Warning => "WARNING",
    Critical => "CRITICAL",
});

string_enum!(AlertSource {
    Vm => "VM",
    Server => "SERVER",
    Monitor => "MONITOR",
    Api => "API",
});
