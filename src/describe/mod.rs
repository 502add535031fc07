pub mod generator;
pub mod resolver;
pub mod rules;

pub use generator::{OpenAiGenerator, TextGenerator};
pub use resolver::{DescriptionResolver, DescriptionSource};
pub use rules::RuleTable;
