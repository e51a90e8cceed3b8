/// Kotlin-style scope functions. Mostly used to finish off iterator chains
/// without introducing a temporary binding.
pub trait LetAlso: Sized {
    fn let_owned<R, F>(self, block: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        block(self)
    }

    fn let_ref<R, F>(&self, block: F) -> R
    where
        F: FnOnce(&Self) -> R,
    {
        block(self)
    }

    fn also<F>(mut self, block: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        block(&mut self);
        self
    }
}

impl<T> LetAlso for T {}
