// ============================================================
// Layer 3 — Milestone Label
// ============================================================
// A milestone names the checkpoint subdirectory a save goes to,
// usually the training step:
//
//   run_dir/
//     all_stat_dict.pth        ← save(None)
//     1000/all_stat_dict.pth   ← save(Some(1000))
//     final/all_stat_dict.pth  ← save(Some("final"))
//
// A blank milestone (step 0 or an empty label) means the same
// as no milestone: the checkpoint goes to the run directory.

use std::{convert::Infallible, fmt, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Milestone {
    Step(u64),
    Label(String),
}

impl Milestone {
    /// True for step 0 and for an empty label
    pub fn is_blank(&self) -> bool {
        match self {
            Milestone::Step(step)   => *step == 0,
            Milestone::Label(label) => label.is_empty(),
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::Step(step)   => write!(f, "{step}"),
            Milestone::Label(label) => f.write_str(label),
        }
    }
}

impl From<u64> for Milestone {
    fn from(step: u64) -> Self {
        Milestone::Step(step)
    }
}

impl From<usize> for Milestone {
    fn from(step: usize) -> Self {
        Milestone::Step(step as u64)
    }
}

impl From<&str> for Milestone {
    fn from(label: &str) -> Self {
        Milestone::Label(label.to_string())
    }
}

impl From<String> for Milestone {
    fn from(label: String) -> Self {
        Milestone::Label(label)
    }
}

/// Digits parse as a step, anything else is a label
impl FromStr for Milestone {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<u64>() {
            Ok(step) => Milestone::Step(step),
            Err(_)   => Milestone::Label(s.to_string()),
        })
    }
}
