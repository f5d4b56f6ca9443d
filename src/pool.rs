// Copyright 2024 the fleetdns authors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Free lists of reusable heap objects.
//!
//! DNS messages are allocation-heavy to build but cheap to clear, so
//! the hot paths recycle them through a process-wide pool instead of
//! dropping them: see [`acquire_message`] and [`release_message`]. A
//! released object keeps the capacity of its internal buffers, which
//! is the point of pooling.

use std::sync::Mutex;

use lazy_static::lazy_static;

use crate::message::Message;

/// Implemented by poolable objects: clears all state left over from
/// the previous use while keeping allocated capacity.
pub trait Reset {
    fn reset(&mut self);
}

/// A simple unbounded free list. Acquiring pops a recycled object, or
/// allocates a fresh default one when the list is empty; releasing
/// resets the object and pushes it back.
pub struct Pool<T> {
    free: Mutex<Vec<Box<T>>>,
}

impl<T: Default + Reset> Pool<T> {
    pub const fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn acquire(&self) -> Box<T> {
        let recycled = self.free.lock().unwrap().pop();
        recycled.unwrap_or_default()
    }

    pub fn release(&self, mut object: Box<T>) {
        object.reset();
        self.free.lock().unwrap().push(object);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

lazy_static! {
    static ref MESSAGE_POOL: Pool<Message> = Pool::new();
}

/// Takes a cleared [`Message`] from the process-wide pool.
pub fn acquire_message() -> Box<Message> {
    MESSAGE_POOL.acquire()
}

/// Returns a [`Message`] to the process-wide pool. The caller must not
/// hold on to any borrow of it.
pub fn release_message(msg: Box<Message>) {
    MESSAGE_POOL.release(msg);
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::parse_message;

    #[test]
    fn release_clears_message_state() {
        let pool: Pool<Message> = Pool::new();
        let mut msg = pool.acquire();
        let payload =
            b"\x00\x02\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\x02hk\x04phus\x02lu\x00\x00\x01\x00\x01";
        parse_message(&mut msg, payload, true).unwrap();
        pool.release(msg);

        let msg = pool.acquire();
        assert!(msg.raw.is_empty());
        assert!(msg.domain.is_empty());
        assert_eq!(msg.header.id, 0);
        assert!(msg.question.name.is_empty());
    }

    #[test]
    fn pool_stays_bounded_by_concurrent_use() {
        let pool: Pool<Message> = Pool::new();
        // Two objects in flight at once never grow the free list past
        // two, no matter how many acquire/release cycles run.
        for _ in 0..100 {
            let a = pool.acquire();
            let b = pool.acquire();
            pool.release(a);
            pool.release(b);
        }
        assert_eq!(pool.len(), 2);
    }
}
