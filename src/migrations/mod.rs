mod m0001_initial;
mod m0002_nutrition;

/// A named, ordered schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

pub fn registry() -> Vec<Migration> {
    vec![m0001_initial::migration(), m0002_nutrition::migration()]
}
