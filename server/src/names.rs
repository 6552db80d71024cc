//! Display name generation for new sessions

use rand::seq::SliceRandom;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Dorothy", "Edsger", "Frances", "Grace", "Hedy", "Ivan",
    "Joan", "John", "Katherine", "Leslie", "Margaret", "Niklaus", "Radia", "Sophie", "Tim",
    "Whitfield",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Backus", "Dijkstra", "Hamilton", "Hopper", "Johnson", "Kay", "Knuth", "Lamarr",
    "Lamport", "Liskov", "Lovelace", "McCarthy", "Perlman", "Ritchie", "Shannon", "Sutherland",
    "Turing", "Wilson", "Wirth",
];

/// Source of human-readable names for new sessions
pub trait NameGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Picks a random "First Last" pair
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNames;

impl NameGenerator for RandomNames {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let first = FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Anonymous");
        let last = LAST_NAMES.choose(&mut rng).copied().unwrap_or("Player");
        format!("{} {}", first, last)
    }
}

/// Always hands out the same name
#[derive(Debug, Clone)]
pub struct FixedName(pub String);

impl NameGenerator for FixedName {
    fn generate(&self) -> String {
        self.0.clone()
    }
}
