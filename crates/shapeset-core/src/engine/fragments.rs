use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::trace;
use tracing::warn;

use super::CollisionPolicy;
use crate::error::Error;
use crate::error::Result;
use crate::shape::Shape;

/// The append-only global fragment pool of one compilation.
#[derive(Debug)]
pub(crate) struct Fragments {
    entries: IndexMap<String, Shape>,
    policy: CollisionPolicy,
}

impl Fragments {
    pub(crate) fn new(policy: CollisionPolicy) -> Self {
        Self {
            entries: IndexMap::new(),
            policy,
        }
    }

    /// Registers `shape` under `name`, hoisting whatever it defines itself.
    pub(crate) fn intern(&mut self, name: String, mut shape: Shape) -> Result<()> {
        let nested = std::mem::take(&mut shape.define);
        self.absorb(nested)?;

        match self.entries.entry(name) {
            Entry::Vacant(slot) => {
                trace!(name = %slot.key(), "Interned fragment");
                slot.insert(shape);
            }
            Entry::Occupied(slot) if *slot.get() != shape => match self.policy {
                CollisionPolicy::FirstWins => {
                    warn!(
                        name = %slot.key(),
                        "Fragment already registered with a different shape, keeping the first"
                    );
                }
                CollisionPolicy::Reject => {
                    return Err(Error::FragmentCollision {
                        name: slot.key().clone(),
                    });
                }
            },
            Entry::Occupied(_) => {}
        }

        Ok(())
    }

    pub(crate) fn absorb(&mut self, fragments: IndexMap<String, Shape>) -> Result<()> {
        for (name, shape) in fragments {
            self.intern(name, shape)?;
        }
        Ok(())
    }

    pub(crate) fn into_define(self) -> IndexMap<String, Shape> {
        self.entries
    }
}
