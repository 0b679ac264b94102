//! Request slot arena and pending chain
//!
//! Submitted requests move into a fixed array of slots. The pending
//! chain links slots through [`Request::next`], with head and tail
//! indices for constant-time append. A [`Ticket`] names a slot together
//! with its generation, so a slot that has been recycled cannot be
//! mistaken for the one a caller is waiting on.

use crate::device::DeviceId;
use crate::transfer::Request;
use crate::MAX_REQUESTS;

/// Claim on a submitted request
///
/// Redeem with `Controller::wait` or give up with `Controller::detach`.
#[must_use = "a submitted request is only returned through its ticket"]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ticket {
    index: u8,
    generation: u8,
}

impl Ticket {
    /// Slot holding the request
    pub fn index(&self) -> usize {
        usize::from(self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    /// Queued or in flight
    Pending,
    /// Finished, waiting to be collected
    Done,
}

#[derive(Debug)]
struct Slot<'d> {
    state: SlotState,
    request: Option<Request<'d>>,
    generation: u8,
    detached: bool,
}

impl Slot<'_> {
    const fn empty() -> Self {
        Self {
            state: SlotState::Free,
            request: None,
            generation: 0,
            detached: false,
        }
    }
}

/// Fixed-capacity request store with an intrusive FIFO chain
#[derive(Debug)]
pub struct Queue<'d> {
    slots: [Slot<'d>; MAX_REQUESTS],
    head: Option<u8>,
    tail: Option<u8>,
}

impl<'d> Queue<'d> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::empty()),
            head: None,
            tail: None,
        }
    }

    /// Move a request into a free slot and append it to the chain
    ///
    /// The request is marked busy with its link cleared. Hands the
    /// request back when every slot is taken.
    pub fn push(&mut self, mut request: Request<'d>) -> Result<Ticket, Request<'d>> {
        let Some(index) = self.slots.iter().position(|s| s.state == SlotState::Free) else {
            return Err(request);
        };
        let index = index as u8;

        request.busy = true;
        request.next = None;
        let slot = &mut self.slots[usize::from(index)];
        slot.state = SlotState::Pending;
        slot.request = Some(request);
        slot.detached = false;
        let ticket = Ticket {
            index,
            generation: slot.generation,
        };

        match self.tail {
            Some(tail) => {
                if let Some(prev) = self.slots[usize::from(tail)].request.as_mut() {
                    prev.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        Ok(ticket)
    }

    /// Slot at the head of the chain
    pub fn head(&self) -> Option<u8> {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Requests linked in the chain
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            count += 1;
            cursor = self.get(index).and_then(|r| r.next);
        }
        count
    }

    pub fn get(&self, index: u8) -> Option<&Request<'d>> {
        self.slots.get(usize::from(index))?.request.as_ref()
    }

    pub fn get_mut(&mut self, index: u8) -> Option<&mut Request<'d>> {
        self.slots.get_mut(usize::from(index))?.request.as_mut()
    }

    /// Unlink the head and move its request out of the slot
    ///
    /// The slot stays reserved until [`Queue::complete`] returns the
    /// request. Busy and link are cleared.
    pub fn pop_front(&mut self) -> Option<(u8, Request<'d>)> {
        let index = self.head?;
        let mut request = self.slots[usize::from(index)].request.take()?;
        self.head = request.next;
        if self.head.is_none() {
            self.tail = None;
        }
        request.next = None;
        request.busy = false;
        Some((index, request))
    }

    /// Return a finished request to its slot
    ///
    /// A detached slot is freed at once, dropping the request.
    pub fn complete(&mut self, index: u8, request: Request<'d>) {
        let slot = &mut self.slots[usize::from(index)];
        if slot.detached {
            Self::free(slot);
        } else {
            slot.request = Some(request);
            slot.state = SlotState::Done;
        }
    }

    /// Whether the ticket's request has finished
    #[cfg(test)]
    pub fn is_done(&self, ticket: &Ticket) -> bool {
        let slot = &self.slots[usize::from(ticket.index)];
        debug_assert_eq!(slot.generation, ticket.generation, "stale ticket");
        slot.state == SlotState::Done
    }

    /// Collect a finished request, freeing its slot
    pub fn release(&mut self, ticket: Ticket) -> Option<Request<'d>> {
        let slot = &mut self.slots[usize::from(ticket.index)];
        debug_assert_eq!(slot.generation, ticket.generation, "stale ticket");
        if slot.generation != ticket.generation || slot.state != SlotState::Done {
            return None;
        }
        let request = slot.request.take();
        Self::free(slot);
        request
    }

    /// Give up a ticket; the slot frees itself once the request finishes
    pub fn detach(&mut self, ticket: Ticket) {
        let slot = &mut self.slots[usize::from(ticket.index)];
        debug_assert_eq!(slot.generation, ticket.generation, "stale ticket");
        if slot.generation != ticket.generation {
            return;
        }
        match slot.state {
            SlotState::Done => Self::free(slot),
            SlotState::Pending => slot.detached = true,
            SlotState::Free => {}
        }
    }

    /// True if any queued or in-flight request belongs to `device`
    pub fn has_device(&self, device: DeviceId) -> bool {
        self.slots.iter().any(|slot| {
            slot.state == SlotState::Pending
                && slot.request.as_ref().is_some_and(|r| r.device() == device)
        })
    }

    /// Slots not free
    #[cfg(test)]
    pub fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state != SlotState::Free)
            .count()
    }

    fn free(slot: &mut Slot<'d>) {
        slot.state = SlotState::Free;
        slot.request = None;
        slot.detached = false;
        slot.generation = slot.generation.wrapping_add(1);
    }
}

impl Default for Queue<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(cs: u8) -> Request<'static> {
        Request::new(DeviceId::new(cs))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = Queue::new();
        let a = queue.push(request(0).command8(1)).unwrap();
        let b = queue.push(request(1).command8(2)).unwrap();
        assert_eq!(queue.len(), 2);
        assert!(queue.get(a.index).unwrap().is_chained());

        let (index, first) = queue.pop_front().unwrap();
        assert_eq!(index, a.index);
        assert_eq!(first.command.value, 1);
        assert!(!first.is_busy());
        assert!(!first.is_chained());
        queue.complete(index, first);

        let (index, second) = queue.pop_front().unwrap();
        assert_eq!(index, b.index);
        assert_eq!(second.command.value, 2);
        assert!(queue.is_empty());
        queue.complete(index, second);

        assert_eq!(queue.release(a).unwrap().command.value, 1);
        assert_eq!(queue.release(b).unwrap().command.value, 2);
        assert_eq!(queue.in_use(), 0);
    }

    #[test]
    fn test_full_returns_request() {
        let mut queue = Queue::new();
        let tickets: heapless::Vec<Ticket, MAX_REQUESTS> = (0..MAX_REQUESTS)
            .map(|_| queue.push(request(0)).unwrap())
            .collect();
        let rejected = queue.push(request(3).command8(9)).unwrap_err();
        assert_eq!(rejected.command.value, 9);
        assert_eq!(tickets.len(), MAX_REQUESTS);
    }

    #[test]
    fn test_busy_while_queued() {
        let mut queue = Queue::new();
        let ticket = queue.push(request(0)).unwrap();
        assert!(queue.get(ticket.index).unwrap().is_busy());
        assert!(!queue.is_done(&ticket));
        assert!(queue.release(ticket).is_none());
    }

    #[test]
    fn test_detach_frees_on_completion() {
        let mut queue = Queue::new();
        let ticket = queue.push(request(0)).unwrap();
        queue.detach(ticket);
        let (index, req) = queue.pop_front().unwrap();
        assert_eq!(queue.in_use(), 1);
        queue.complete(index, req);
        assert_eq!(queue.in_use(), 0);
    }

    #[test]
    fn test_detach_after_completion() {
        let mut queue = Queue::new();
        let ticket = queue.push(request(0)).unwrap();
        let (index, req) = queue.pop_front().unwrap();
        queue.complete(index, req);
        queue.detach(ticket);
        assert_eq!(queue.in_use(), 0);
    }

    #[test]
    fn test_recycled_slot_gets_new_generation() {
        let mut queue = Queue::new();
        let first = queue.push(request(0)).unwrap();
        let (index, req) = queue.pop_front().unwrap();
        queue.complete(index, req);
        let generation = first.generation;
        queue.release(first).unwrap();

        let second = queue.push(request(0)).unwrap();
        assert_eq!(second.index, index);
        assert_ne!(second.generation, generation);
    }

    #[test]
    fn test_has_device() {
        let mut queue = Queue::new();
        let _ticket = queue.push(request(2)).unwrap();
        assert!(queue.has_device(DeviceId::new(2)));
        assert!(!queue.has_device(DeviceId::new(1)));
        let (index, req) = queue.pop_front().unwrap();
        queue.complete(index, req);
        assert!(!queue.has_device(DeviceId::new(2)));
    }
}
