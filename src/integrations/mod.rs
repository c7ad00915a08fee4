//! External service integrations.

pub mod ocr {
    pub use crate::ocr::*;
}

pub mod llm {
    pub use crate::llm::*;
}
