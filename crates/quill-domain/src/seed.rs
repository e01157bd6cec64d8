use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::info;

use crate::{Domain, DomainError, DomainResult};

const WORDS: &[&str] = &[
    "amber", "birch", "cedar", "dune", "ember", "fjord", "grove", "harbor", "iris", "juniper",
    "kestrel", "lark", "meadow", "north", "osprey", "pine", "quarry", "reed", "slate", "thorn",
];

const SENTENCES: &[&str] = &[
    "The morning fog lifted slowly over the harbor.",
    "Nobody expected the third act to land the way it did.",
    "A good espresso fixes most architectural disagreements.",
    "The trail forks twice before the ridge line.",
    "We shipped it on a Friday and lived to tell the tale.",
    "Every migration has exactly one surprise in it.",
    "The lighthouse keeper kept meticulous notes.",
];

impl Domain {
    /// Populate development data: random confirmed users and posts.
    /// Unique-constraint collisions are skipped, matching the tolerant
    /// behavior expected of a dev seeder.
    pub fn seed_fake_data(&self, user_count: u32, post_count: u32) -> DomainResult<()> {
        let mut rng = rand::rng();
        let mut created = Vec::new();

        for _ in 0..user_count {
            let word = WORDS.choose(&mut rng).unwrap();
            let n: u32 = rng.random_range(1..10_000);
            let username = format!("{word}{n}");
            let email = format!("{username}@example.org");
            match self.register(&email, &username, "password") {
                Ok(user) => {
                    self.db.set_confirmed(&user.id)?;
                    created.push(user);
                }
                Err(DomainError::Validation(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        if created.is_empty() {
            return Ok(());
        }

        for _ in 0..post_count {
            let author = created.choose(&mut rng).unwrap();
            let body = (0..rng.random_range(1..4))
                .map(|_| *SENTENCES.choose(&mut rng).unwrap())
                .collect::<Vec<_>>()
                .join(" ");
            self.create_post(&author.id, &body)?;
        }

        info!(
            users = created.len(),
            posts = post_count,
            "seeded development data"
        );
        Ok(())
    }
}
