//! Hand-landmark classification.
//!
//! Turns one detected hand (21 normalised landmarks plus the handedness label
//! reported by the tracker) into a [`GestureIntent`].  The camera image is
//! mirrored, so the `Right` label is the operator's physical left hand: it
//! counts pumps, while the `Left` label signs letters.

use std::fmt;
use std::str::FromStr;

use gate_types::{Command, GateError, Letter};

/// Landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;
/// Thumb-tip to index-tip distance below which the hand reads as `O`.
pub const PINCH_DISTANCE: f32 = 0.05;

const THUMB_TIP: usize = 4;
const THUMB_JOINT: usize = 3;
const INDEX_TIP: usize = 8;
/// Tips of index, middle, ring and pinky; each is compared with the joint two
/// indices below it.
const FINGER_TIPS: [usize; 4] = [8, 12, 16, 20];

/// Normalised image coordinates; `y` grows downwards.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Handedness label as reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl FromStr for Handedness {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            l if l.eq_ignore_ascii_case("left") => Ok(Handedness::Left),
            r if r.eq_ignore_ascii_case("right") => Ok(Handedness::Right),
            other => Err(GateError::MalformedCommand {
                line: other.to_string(),
                reason: "handedness must be Left or Right".to_string(),
            }),
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        })
    }
}

/// Which fingers are extended: `[thumb, index, middle, ring, pinky]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FingerPattern(pub [bool; 5]);

impl FingerPattern {
    pub const MODE_TOGGLE: FingerPattern = FingerPattern([true, true, false, false, true]);
    const LETTER_L: FingerPattern = FingerPattern([true, true, false, false, false]);
    const LETTER_V: FingerPattern = FingerPattern([false, true, true, false, false]);
    const LETTER_V_THUMB: FingerPattern = FingerPattern([true, true, true, false, false]);

    /// Build from `0`/`1` flags.
    pub fn from_bits(bits: [u8; 5]) -> Self {
        FingerPattern(bits.map(|b| b != 0))
    }

    pub fn extended(&self) -> u8 {
        self.0.iter().filter(|&&up| up).count() as u8
    }
}

impl fmt::Display for FingerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: Vec<&str> = self.0.iter().map(|&up| if up { "1" } else { "0" }).collect();
        write!(f, "[{}]", bits.join(","))
    }
}

/// One tracked hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandSample {
    pub handedness: Handedness,
    pub landmarks: [Landmark; LANDMARK_COUNT],
}

impl HandSample {
    /// Reduce the landmarks to the features the classifier uses.
    pub fn pose(&self) -> HandPose {
        let lm = &self.landmarks;
        let thumb = match self.handedness {
            Handedness::Right => lm[THUMB_TIP].x < lm[THUMB_JOINT].x,
            Handedness::Left => lm[THUMB_TIP].x > lm[THUMB_JOINT].x,
        };
        let mut fingers = [thumb, false, false, false, false];
        for (slot, tip) in fingers[1..].iter_mut().zip(FINGER_TIPS) {
            *slot = lm[tip].y < lm[tip - 2].y;
        }
        HandPose {
            handedness: self.handedness,
            fingers: FingerPattern(fingers),
            pinch: lm[THUMB_TIP].distance(lm[INDEX_TIP]) < PINCH_DISTANCE,
        }
    }
}

/// The classifier's view of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandPose {
    pub handedness: Handedness,
    pub fingers: FingerPattern,
    /// Thumb and index tips touching.
    pub pinch: bool,
}

/// What a hand is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureIntent {
    /// Switch between Manual and Automatic.
    ModeToggle,
    /// A manual command, still subject to permission checks.
    Candidate(Command),
    Nothing,
}

/// Classify a pose.  The toggle sign wins on either hand; everything else is
/// a manual command.
pub fn classify(pose: &HandPose) -> GestureIntent {
    if pose.fingers == FingerPattern::MODE_TOGGLE {
        return GestureIntent::ModeToggle;
    }
    match pose.handedness {
        Handedness::Right => match pose.fingers.extended() {
            0 => GestureIntent::Candidate(Command::Fist),
            n => Command::number(n)
                .map(GestureIntent::Candidate)
                .unwrap_or(GestureIntent::Nothing),
        },
        Handedness::Left => {
            let letter = if pose.pinch {
                Some(Letter::O)
            } else if pose.fingers == FingerPattern::LETTER_L {
                Some(Letter::L)
            } else if pose.fingers == FingerPattern::LETTER_V
                || pose.fingers == FingerPattern::LETTER_V_THUMB
            {
                Some(Letter::V)
            } else {
                None
            };
            letter
                .map(|l| GestureIntent::Candidate(Command::Letter(l)))
                .unwrap_or(GestureIntent::Nothing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthesise landmarks for a pattern.  Joints sit at y = 0.5; extended
    /// tips go above them, curled tips below.  Thumb and index tips are kept
    /// apart unless `pinch` is set.
    fn sample(handedness: Handedness, bits: [u8; 5], pinch: bool) -> HandSample {
        let mut lm = [Landmark::new(0.5, 0.5); LANDMARK_COUNT];
        for (i, tip) in FINGER_TIPS.into_iter().enumerate() {
            let x = 0.2 + 0.15 * i as f32;
            lm[tip - 2] = Landmark::new(x, 0.5);
            lm[tip] = Landmark::new(x, if bits[i + 1] == 1 { 0.2 } else { 0.7 });
        }
        let out = match handedness {
            Handedness::Right => -0.1,
            Handedness::Left => 0.1,
        };
        let dir = if bits[0] == 1 { out } else { -out };
        lm[THUMB_JOINT] = Landmark::new(0.5, 0.9);
        lm[THUMB_TIP] = Landmark::new(0.5 + dir, 0.9);
        if pinch {
            lm[THUMB_TIP] = Landmark::new(lm[INDEX_TIP].x + 0.01, lm[INDEX_TIP].y);
        }
        HandSample { handedness, landmarks: lm }
    }

    fn intent(h: Handedness, bits: [u8; 5]) -> GestureIntent {
        classify(&sample(h, bits, false).pose())
    }

    #[test]
    fn pose_reads_fingers_and_mirrored_thumb() {
        let right = sample(Handedness::Right, [1, 0, 1, 0, 1], false).pose();
        assert_eq!(right.fingers, FingerPattern::from_bits([1, 0, 1, 0, 1]));
        let left = sample(Handedness::Left, [1, 1, 0, 0, 0], false).pose();
        assert_eq!(left.fingers, FingerPattern::from_bits([1, 1, 0, 0, 0]));
        assert!(!left.pinch);
    }

    #[test]
    fn toggle_sign_on_either_hand() {
        assert_eq!(intent(Handedness::Right, [1, 1, 0, 0, 1]), GestureIntent::ModeToggle);
        assert_eq!(intent(Handedness::Left, [1, 1, 0, 0, 1]), GestureIntent::ModeToggle);
    }

    #[test]
    fn right_hand_counts_pumps() {
        assert_eq!(
            intent(Handedness::Right, [0, 1, 1, 0, 0]),
            GestureIntent::Candidate(Command::number(2).unwrap())
        );
        assert_eq!(
            intent(Handedness::Right, [1, 1, 1, 1, 1]),
            GestureIntent::Candidate(Command::number(5).unwrap())
        );
        assert_eq!(
            intent(Handedness::Right, [0, 0, 0, 0, 0]),
            GestureIntent::Candidate(Command::Fist)
        );
    }

    #[test]
    fn left_hand_signs_letters() {
        assert_eq!(
            intent(Handedness::Left, [1, 1, 0, 0, 0]),
            GestureIntent::Candidate(Command::Letter(Letter::L))
        );
        assert_eq!(
            intent(Handedness::Left, [0, 1, 1, 0, 0]),
            GestureIntent::Candidate(Command::Letter(Letter::V))
        );
        assert_eq!(
            intent(Handedness::Left, [1, 1, 1, 0, 0]),
            GestureIntent::Candidate(Command::Letter(Letter::V))
        );
        assert_eq!(intent(Handedness::Left, [0, 0, 0, 0, 1]), GestureIntent::Nothing);
    }

    #[test]
    fn pinch_reads_as_o_before_patterns() {
        let pose = sample(Handedness::Left, [1, 1, 0, 0, 0], true).pose();
        assert!(pose.pinch);
        assert_eq!(
            classify(&pose),
            GestureIntent::Candidate(Command::Letter(Letter::O))
        );
    }

    #[test]
    fn handedness_parses_case_insensitively() {
        assert_eq!("left".parse::<Handedness>().unwrap(), Handedness::Left);
        assert_eq!(" Right ".parse::<Handedness>().unwrap(), Handedness::Right);
        assert!("both".parse::<Handedness>().is_err());
    }

    #[test]
    fn pattern_display() {
        assert_eq!(FingerPattern::MODE_TOGGLE.to_string(), "[1,1,0,0,1]");
        assert_eq!(FingerPattern::MODE_TOGGLE.extended(), 3);
    }
}
