mod construction_error;
mod variables;

pub use construction_error::ConstructionError;
pub use variables::BinaryVariable;
pub use variables::FactorId;
pub use variables::Literal;
pub use variables::MultiVariable;
