/// Hands out `<PREFIX>-<NNN>` ids. Callers own the counter and pass it by `&mut`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSequence {
    prefix: String,
    next: u32,
}

impl IdSequence {
    pub fn new(prefix: &str) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(prefix: &str, next: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: next.max(1),
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("{}-{:03}", self.prefix, self.next);
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u32 {
        self.next
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
