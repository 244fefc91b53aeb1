//! Mount/unmount hooks for components that hold external registrations.

/// A component that acquires a resource when mounted and releases it when
/// unmounted. Both operations must tolerate repeated calls.
pub trait Lifecycle {
    type Error;

    fn activate(&self) -> Result<(), Self::Error>;

    fn deactivate(&self);
}

/// Activate `component` and return a guard that deactivates it on drop.
///
/// # Errors
/// Returns the component's activation error; nothing is mounted in that case.
pub fn mount<L: Lifecycle + ?Sized>(component: &L) -> Result<Mounted<'_, L>, L::Error> {
    component.activate()?;
    Ok(Mounted {
        component: Some(component),
    })
}

/// A mounted component. Unmounts on drop.
#[must_use = "dropping the guard unmounts the component immediately"]
pub struct Mounted<'a, L: Lifecycle + ?Sized> {
    component: Option<&'a L>,
}

impl<L: Lifecycle + ?Sized> Mounted<'_, L> {
    pub fn unmount(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(component) = self.component.take() {
            component.deactivate();
        }
    }
}

impl<L: Lifecycle + ?Sized> Drop for Mounted<'_, L> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<L: Lifecycle + ?Sized> std::fmt::Debug for Mounted<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mounted")
            .field("mounted", &self.component.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter {
        activations: Cell<u32>,
        deactivations: Cell<u32>,
        refuse: bool,
    }

    impl Lifecycle for Counter {
        type Error = &'static str;

        fn activate(&self) -> Result<(), Self::Error> {
            if self.refuse {
                return Err("refused");
            }
            self.activations.set(self.activations.get() + 1);
            Ok(())
        }

        fn deactivate(&self) {
            self.deactivations.set(self.deactivations.get() + 1);
        }
    }

    #[test]
    fn test_drop_unmounts_once() {
        let counter = Counter::default();
        {
            let _mounted = mount(&counter).unwrap();
            assert_eq!(counter.activations.get(), 1);
        }
        assert_eq!(counter.deactivations.get(), 1);
    }

    #[test]
    fn test_explicit_unmount_does_not_repeat_on_drop() {
        let counter = Counter::default();
        let mounted = mount(&counter).unwrap();
        mounted.unmount();
        assert_eq!(counter.deactivations.get(), 1);
    }

    #[test]
    fn test_failed_activation_mounts_nothing() {
        let counter = Counter {
            refuse: true,
            ..Counter::default()
        };
        assert_eq!(mount(&counter).unwrap_err(), "refused");
        assert_eq!(counter.deactivations.get(), 0);
    }
}
