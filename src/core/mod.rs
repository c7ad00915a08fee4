// Domain-layer modules and shared errors/models
pub mod biometric {
    pub use crate::biometric::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod pipeline {
    pub use crate::pipeline::*;
}

pub mod risk {
    pub use crate::risk::*;
}

pub mod errors {
    pub use crate::errors::*;
}
