use crate::allocator::Word;

/// A slot the collector treats as a root. Handles held across any call that
/// may allocate must live in a root and be re-read from it afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Root {
    /// A permanent root, never released
    Global(usize),
    /// A stack-allocated root, released by `Heap::pop_locals`
    Local(usize),
}

/// The precise root set: permanent globals plus a stack of locals
#[derive(Default)]
pub struct RootSet {
    pub globals: Vec<Word>,
    pub locals: Vec<Word>,
}

impl RootSet {
    pub fn get(&self, root: Root) -> Word {
        match root {
            Root::Global(index) => self.globals[index],
            Root::Local(index) => self.locals[index],
        }
    }

    pub fn set(&mut self, root: Root, word: Word) {
        match root {
            Root::Global(index) => self.globals[index] = word,
            Root::Local(index) => self.locals[index] = word,
        }
    }

    pub fn add_global(&mut self, word: Word) -> Root {
        self.globals.push(word);
        Root::Global(self.globals.len() - 1)
    }

    pub fn push_local(&mut self, word: Word) -> Root {
        self.locals.push(word);
        Root::Local(self.locals.len() - 1)
    }

    /// Every root word, globals first
    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.globals.iter().chain(self.locals.iter())
    }
}
