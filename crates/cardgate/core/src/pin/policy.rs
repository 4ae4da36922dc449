use derive_more::Display;

/// Combination of reader, PIN and dialog the strict pinpad policy forbids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PolicyViolation {
    #[display(
        "Strict pinpad enforcement is enabled. This request was sent with a PIN, but the reader has a pinpad."
    )]
    PinWithPinpad,
    #[display(
        "Strict pinpad enforcement is enabled. This request was sent without a PIN, but the reader does not have a pinpad and OS PIN dialog is not enabled."
    )]
    PinRequired,
}

impl PolicyViolation {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PinWithPinpad => "600",
            Self::PinRequired => "601",
        }
    }
}

/// PIN submission policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinPolicy {
    /// Require the hardware pinpad when the reader has one, and a PIN or an
    /// OS dialog when it does not
    pub force_hardware_pinpad: bool,
}

impl PinPolicy {
    /// Create a policy, strict when `force_hardware_pinpad` is set
    pub const fn new(force_hardware_pinpad: bool) -> Self {
        Self {
            force_hardware_pinpad,
        }
    }

    /// Decide whether a submission is allowed on a reader
    ///
    /// Only a strict policy rejects anything: a PIN on a pinpad reader, or
    /// no PIN and no OS dialog on a reader without one.
    pub const fn evaluate(&self, pinpad: bool, has_pin: bool, os_dialog: bool) -> Result<(), PolicyViolation> {
        if !self.force_hardware_pinpad {
            return Ok(());
        }
        match (pinpad, has_pin, os_dialog) {
            (true, true, _) => Err(PolicyViolation::PinWithPinpad),
            (false, false, false) => Err(PolicyViolation::PinRequired),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        let relaxed = PinPolicy::new(false);
        let strict = PinPolicy::new(true);

        for pinpad in [false, true] {
            for has_pin in [false, true] {
                for os_dialog in [false, true] {
                    assert_eq!(relaxed.evaluate(pinpad, has_pin, os_dialog), Ok(()));
                }
            }
        }

        assert_eq!(strict.evaluate(true, true, false), Err(PolicyViolation::PinWithPinpad));
        assert_eq!(strict.evaluate(true, true, true), Err(PolicyViolation::PinWithPinpad));
        assert_eq!(strict.evaluate(true, false, false), Ok(()));
        assert_eq!(strict.evaluate(false, true, false), Ok(()));
        assert_eq!(strict.evaluate(false, false, true), Ok(()));
        assert_eq!(strict.evaluate(false, false, false), Err(PolicyViolation::PinRequired));
    }

    #[test]
    fn test_violation_messages() {
        assert_eq!(PolicyViolation::PinWithPinpad.code(), "600");
        assert_eq!(PolicyViolation::PinRequired.code(), "601");
        assert!(PolicyViolation::PinRequired.to_string().ends_with("OS PIN dialog is not enabled."));
    }
}
