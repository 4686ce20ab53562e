use std::error::Error;
use std::fmt;

/// Errors surfaced at the host boundary (construction, disc attachment).
///
/// CPU exceptions are not represented here: they are first-class, always
/// handled in-core, and never escape `Cpu::step`.
#[derive(Debug)]
pub enum SystemError {
    /// The supplied BIOS image was the wrong size to be mapped at
    /// `0x1FC00000..0x1FC7FFFF`.
    InvalidBios { expected: usize, actual: usize },
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBios { expected, actual } => write!(
                f,
                "BIOS image must be {} bytes, got {}",
                expected, actual
            ),
        }
    }
}

impl Error for SystemError {}

/// A sticky fault recorded by the bus when a guarded loop (currently only
/// the DMA2 linked-list walk) would otherwise run forever. The bus's public
/// `step()` contract stays infallible; callers observe faults by polling
/// `Bus::take_fault`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFault {
    /// The DMA2 linked-list walker exceeded `MAX_DMA_LIST_STEPS` without
    /// encountering an end-of-list marker.
    DmaListOverrun { steps: usize },
}

impl fmt::Display for BusFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DmaListOverrun { steps } => {
                write!(f, "DMA2 linked list exceeded {} steps without terminator", steps)
            }
        }
    }
}

impl Error for BusFault {}
