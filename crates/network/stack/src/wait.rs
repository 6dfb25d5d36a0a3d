//! Bounded busy-wait steps

/// One step of a bounded wait
///
/// Resolution and ping loops call [`Waiter::wait`] once per poll iteration.
/// Returning `false` abandons the wait early, which the caller reports the
/// same way as an exhausted budget.
pub trait Waiter {
    fn wait(&mut self) -> bool;
}

/// Spin-loop hint between polls; never cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct Spin;

impl Waiter for Spin {
    fn wait(&mut self) -> bool {
        core::hint::spin_loop();
        true
    }
}

impl<W: Waiter + ?Sized> Waiter for &mut W {
    fn wait(&mut self) -> bool {
        (**self).wait()
    }
}
