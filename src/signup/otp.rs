//! Six-slot one-time code input. Slots hold at most one digit each; focus walks
//! forward on input and backward on backspace over empty slots. The widget sends
//! nothing itself: a completed code is returned to the caller exactly once.

use std::fmt;

pub const CODE_LENGTH: usize = 6;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OtpInput {
    slots: [Option<u8>; CODE_LENGTH],
    focus: usize,
    disabled: bool,
    /// Last code handed out, cleared whenever the code becomes incomplete.
    emitted: Option<[u8; CODE_LENGTH]>,
}

impl OtpInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles a keystroke in slot `index`.
    ///
    /// Non-digits are stripped first; anything still longer than one digit is
    /// ignored and an empty value clears the slot. Returns the full code when this
    /// write completes it and the same code was not already returned.
    pub fn on_digit(&mut self, index: usize, value: &str) -> Option<String> {
        if self.disabled || index >= CODE_LENGTH {
            return None;
        }

        let digits: Vec<u8> = value
            .chars()
            .filter_map(|c| c.to_digit(10))
            .filter_map(|d| u8::try_from(d).ok())
            .collect();

        match digits.as_slice() {
            [] => {
                self.slots[index] = None;
                self.emitted = None;
                None
            }
            [digit] => {
                self.slots[index] = Some(*digit);
                if index < CODE_LENGTH - 1 {
                    self.focus = index + 1;
                }
                self.take_completion()
            }
            _ => None,
        }
    }

    /// Handles backspace in slot `index`. An empty slot hands focus to its left
    /// neighbour without touching it; a filled slot is cleared in place.
    pub fn on_backspace(&mut self, index: usize) {
        if self.disabled || index >= CODE_LENGTH {
            return;
        }

        if self.slots[index].is_some() {
            self.slots[index] = None;
            self.emitted = None;
            self.focus = index;
        } else if index > 0 {
            self.focus = index - 1;
        }
    }

    /// Empties every slot and puts focus back on the first one.
    pub fn clear(&mut self) {
        self.slots = [None; CODE_LENGTH];
        self.focus = 0;
        self.emitted = None;
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[must_use]
    pub fn focus(&self) -> usize {
        self.focus
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Option<u8> {
        self.slots.get(index).copied().flatten()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// The six-character code, if every slot is filled.
    #[must_use]
    pub fn code(&self) -> Option<String> {
        self.digits().map(|digits| digits_to_string(&digits))
    }

    fn digits(&self) -> Option<[u8; CODE_LENGTH]> {
        let mut digits = [0u8; CODE_LENGTH];
        for (out, slot) in digits.iter_mut().zip(self.slots.iter()) {
            *out = (*slot)?;
        }
        Some(digits)
    }

    fn take_completion(&mut self) -> Option<String> {
        let Some(digits) = self.digits() else {
            self.emitted = None;
            return None;
        };

        if self.emitted == Some(digits) {
            return None;
        }

        self.emitted = Some(digits);
        Some(digits_to_string(&digits))
    }
}

/// Renders filled slots as digits and empty ones as `_`.
impl fmt::Display for OtpInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for slot in &self.slots {
            match slot {
                Some(digit) => write!(f, "{digit}")?,
                None => f.write_str("_")?,
            }
        }
        Ok(())
    }
}

fn digits_to_string(digits: &[u8; CODE_LENGTH]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}
