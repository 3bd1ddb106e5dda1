use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::rc::Rc;

use log::trace;

use crate::posix;

/// A LIFO stack of release actions.
///
/// Resource acquisitions register their release with [`defer`](Self::defer);
/// [`run`](Self::run) pops and invokes the actions in reverse registration
/// order.  Dropping the stack runs it, so releases happen on every
/// control-flow exit of the owning scope.  Releases must be infallible.
///
/// Pipeline execution uses two nested stacks: the inner one releases the
/// child-facing pipe ends and the null device as soon as the fork/setup
/// block exits, so the kernel can deliver HUP when a child closes its end;
/// the outer one releases the parent-facing ends only after every child has
/// been reaped, keeping them usable throughout the readiness loop.
pub(crate) struct Cleanup {
    actions: Vec<Box<dyn FnOnce()>>,
}

impl Cleanup {
    pub fn new() -> Cleanup {
        Cleanup {
            actions: Vec::new(),
        }
    }

    pub fn defer<F: FnOnce() + 'static>(&mut self, action: F) {
        self.actions.push(Box::new(action));
    }

    pub fn run(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        self.run();
    }
}

/// A shared slot holding one end of a pipe.
///
/// The channel owning a pipe end and the cleanup stack guarding it hold
/// clones of the same slot, so the readiness loop can close the descriptor
/// early (on HUP or EOF) while the stack's later release degrades to a
/// no-op.  `close` is idempotent.
#[derive(Clone)]
pub(crate) struct FdSlot(Rc<RefCell<Option<File>>>);

impl FdSlot {
    pub fn new(file: File) -> FdSlot {
        FdSlot(Rc::new(RefCell::new(Some(file))))
    }

    pub fn is_open(&self) -> bool {
        self.0.borrow().is_some()
    }

    pub fn close(&self) {
        if let Some(file) = self.0.borrow_mut().take() {
            trace!("closing fd {}", file.as_raw_fd());
        }
    }

    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.borrow_mut().as_mut() {
            Some(file) => file.read(buf),
            None => Err(io::Error::from_raw_os_error(posix::EBADF)),
        }
    }

    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match self.0.borrow_mut().as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::from_raw_os_error(posix::EBADF)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cleanup;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn runs_in_lifo_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut stack = Cleanup::new();
        for i in 0..3 {
            let order = Rc::clone(&order);
            stack.defer(move || order.borrow_mut().push(i));
        }
        stack.run();
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn runs_on_drop() {
        let ran = Rc::new(RefCell::new(false));
        {
            let ran = Rc::clone(&ran);
            let mut stack = Cleanup::new();
            stack.defer(move || *ran.borrow_mut() = true);
        }
        assert!(*ran.borrow());
    }

    #[test]
    fn run_is_idempotent() {
        let count = Rc::new(RefCell::new(0));
        let mut stack = Cleanup::new();
        {
            let count = Rc::clone(&count);
            stack.defer(move || *count.borrow_mut() += 1);
        }
        stack.run();
        stack.run();
        drop(stack);
        assert_eq!(*count.borrow(), 1);
    }
}
