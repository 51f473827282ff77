//! Placeholder name generation.

/// Produces collision-free placeholder names for one translation unit:
/// `p0`, `p1`, ... for the default prefix.
///
/// A generator is owned by a single processing pass and never shared.
#[derive(Debug, Clone)]
pub struct ParameterNameGenerator {
    prefix: String,
    count: usize,
}

impl ParameterNameGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            count: 0,
        }
    }

    pub fn generate_next(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.count);
        self.count += 1;
        name
    }

    /// Names handed out so far
    pub fn generated(&self) -> usize {
        self.count
    }
}

/// Creates a fresh generator per translation unit.
pub trait ParameterNameGeneratorFactory: Send + Sync {
    fn create(&self) -> ParameterNameGenerator;
}

#[derive(Debug, Clone)]
pub struct DefaultParameterNameGeneratorFactory {
    prefix: String,
}

impl DefaultParameterNameGeneratorFactory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for DefaultParameterNameGeneratorFactory {
    fn default() -> Self {
        Self::new("p")
    }
}

impl ParameterNameGeneratorFactory for DefaultParameterNameGeneratorFactory {
    fn create(&self) -> ParameterNameGenerator {
        ParameterNameGenerator::new(self.prefix.clone())
    }
}
