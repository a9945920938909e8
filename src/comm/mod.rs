//! Messaging collaborator: non-blocking point-to-point sends/receives with
//! waitable handles, over which [`bulk`] builds the bulk-synchronous
//! phases the ghost and snap protocols require.
//!
//! Wire conventions for the higher-level protocols:
//! - All integers are LE fixed width (u16 kinds, u32 counts/ranks, u64
//!   handles); `f64` travels as its LE bit pattern.
//! - Message delivery is FIFO per `(source, destination, tag)` triple.
//!   Sequential protocol phases may therefore reuse a tag pair as long as
//!   every rank drains each phase completely before starting the next.

pub mod bulk;

use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Non-blocking communication interface (minimal by design).
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Rank of this process (0..size-1).
    fn rank(&self) -> usize;
    /// Total number of ranks.
    fn size(&self) -> usize;

    /// True for the no-op communicator (lets serial paths short-circuit).
    fn is_no_comm(&self) -> bool {
        false
    }

    /// Synchronization barrier (default: no-op for non-MPI comms).
    fn barrier(&self) {}
}

/// Tag newtype for safer tag arithmetic.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CommTag(u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Offset the tag by `dx`, wrapping on overflow.
    #[inline]
    pub const fn offset(self, dx: u16) -> Self {
        Self(self.0.wrapping_add(dx))
    }
}

impl From<u16> for CommTag {
    #[inline]
    fn from(x: u16) -> Self {
        CommTag::new(x)
    }
}

/// Compile-time no-op comm for pure serial runs and unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn is_no_comm(&self) -> bool {
        true
    }

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }
}

// --- ThreadComm: one rank per thread, process-wide mailbox ---

type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Slot {
    q: VecDeque<Vec<u8>>,
}

struct Mailbox {
    map: Mutex<HashMap<Key, Arc<(Mutex<Slot>, Condvar)>>>,
}

static MAILBOX: Lazy<Mailbox> = Lazy::new(|| Mailbox {
    map: Mutex::new(HashMap::new()),
});

fn mailbox_entry(key: Key) -> Arc<(Mutex<Slot>, Condvar)> {
    let mut g = MAILBOX.map.lock().expect("MAILBOX poisoned");
    g.entry(key)
        .or_insert_with(|| Arc::new((Mutex::new(Slot::default()), Condvar::new())))
        .clone()
}

pub struct ThreadSendHandle;

impl Wait for ThreadSendHandle {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

pub struct ThreadRecvHandle {
    cell: Arc<(Mutex<Slot>, Condvar)>,
    want_len: usize,
}

impl Wait for ThreadRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let (lock, cv) = &*self.cell;
        let mut slot = lock.lock().expect("Slot poisoned");
        while slot.q.is_empty() {
            slot = cv.wait(slot).expect("Condvar poisoned");
        }
        let mut msg = slot.q.pop_front().expect("q non-empty");
        msg.truncate(self.want_len.min(msg.len()));
        Some(msg)
    }
}

/// In-process communicator: each rank runs on its own thread; messages go
/// through a process-wide mailbox keyed by `(src, dst, tag)`.
///
/// Tests sharing a process must use disjoint tag ranges to avoid
/// cross-talk through the shared mailbox.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
}

impl ThreadComm {
    pub fn new(rank: usize, size: usize) -> Self {
        assert!(rank < size);
        Self { rank, size }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ThreadSendHandle;
    type RecvHandle = ThreadRecvHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        let entry = mailbox_entry(key);
        let (lock, cv) = &*entry;
        {
            let mut slot = lock.lock().expect("Slot poisoned");
            slot.q.push_back(buf.to_vec());
        }
        cv.notify_all();
        ThreadSendHandle
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        let key = (peer, self.rank, tag);
        ThreadRecvHandle {
            cell: mailbox_entry(key),
            want_len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::CommunicatorCollectives;
    use mpi::environment::Universe;
    use mpi::point_to_point::{Destination, Source};
    use mpi::request::{Request, StaticScope};
    use mpi::topology::{Communicator as _, SimpleCommunicator};

    /// Heap buffer with a stable address, loaned to an in-flight MPI
    /// request as `'static`.
    ///
    /// The loan must end (the request must complete) before the buffer
    /// drops; [`MpiSendHandle`] and [`MpiRecvHandle`] enforce that by
    /// blocking on any outstanding request in their `Drop`.
    struct LoanedBuf {
        raw: *mut [u8],
    }

    impl LoanedBuf {
        fn new(data: Vec<u8>) -> Self {
            Self {
                raw: Box::into_raw(data.into_boxed_slice()),
            }
        }

        /// # Safety
        /// The returned slice is only valid while `self` is alive.
        unsafe fn loan(&self) -> &'static [u8] {
            unsafe { &*self.raw }
        }

        /// # Safety
        /// The returned slice is only valid while `self` is alive, and
        /// must be the sole reference to the buffer for that span.
        unsafe fn loan_mut(&mut self) -> &'static mut [u8] {
            unsafe { &mut *self.raw }
        }

        /// Copy the contents out once the loan has ended.
        fn copy_out(&self) -> Vec<u8> {
            unsafe { (*self.raw).to_vec() }
        }
    }

    impl Drop for LoanedBuf {
        fn drop(&mut self) {
            unsafe { drop(Box::from_raw(self.raw)) }
        }
    }

    pub struct MpiComm {
        _universe: Universe,
        pub world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    // Universe and SimpleCommunicator are not Sync; each part drives its
    // communicator from a single control thread (the crate's scheduling
    // model), so sharing the handle is sound.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl Default for MpiComm {
        fn default() -> Self {
            let universe = mpi::initialize().expect("MPI initialization failed");
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                _universe: universe,
                world,
                rank,
                size,
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
            let buf = LoanedBuf::new(buf.to_vec());
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, unsafe { buf.loan() }, tag as i32);
            MpiSendHandle {
                req: Some(req),
                _buf: buf,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, template: &mut [u8]) -> Self::RecvHandle {
            let len = template.len();
            let mut buf = LoanedBuf::new(vec![0u8; len]);
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, unsafe { buf.loan_mut() }, tag as i32);
            MpiRecvHandle {
                req: Some(req),
                buf,
                len,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
        fn barrier(&self) {
            self.world.barrier();
        }
    }

    pub struct MpiSendHandle {
        req: Option<Request<'static, [u8], StaticScope>>,
        _buf: LoanedBuf,
    }

    impl Wait for MpiSendHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(r) = self.req.take() {
                let _ = r.wait();
            }
            None
        }
    }

    impl Drop for MpiSendHandle {
        fn drop(&mut self) {
            // The buffer cannot be reclaimed under an in-flight request.
            if let Some(r) = self.req.take() {
                log::warn!("MPI send handle dropped before wait; blocking until completion");
                let _ = r.wait();
            }
        }
    }

    pub struct MpiRecvHandle {
        req: Option<Request<'static, [u8], StaticScope>>,
        buf: LoanedBuf,
        len: usize,
    }

    impl Wait for MpiRecvHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            let req = self.req.take()?;
            let _ = req.wait();
            let mut v = self.buf.copy_out();
            v.truncate(self.len);
            Some(v)
        }
    }

    impl Drop for MpiRecvHandle {
        fn drop(&mut self) {
            if let Some(r) = self.req.take() {
                log::warn!("MPI receive handle dropped before wait; blocking until completion");
                let _ = r.wait();
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(all(test, feature = "mpi-support"))]
mod mpi_tests {
    use super::*;

    // Needs an MPI runtime:
    // `mpiexec -n 1 cargo test --features mpi-support mpi_tests`.
    #[test]
    fn mpi_self_round_trip() {
        let comm = MpiComm::default();
        let me = comm.rank();
        let msg = b"halo";
        let mut buf = [0u8; 4];
        let r = comm.irecv(me, 0x0400, &mut buf);
        let s = comm.isend(me, 0x0400, msg);
        assert_eq!(r.wait().unwrap(), msg);
        let _ = s.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_comm_round_trip() {
        let c0 = ThreadComm::new(0, 2);
        let c1 = ThreadComm::new(1, 2);

        let msg = b"hello";
        let _s = c0.isend(1, 0x0100, msg);

        let mut buf = [0u8; 5];
        let h = c1.irecv(0, 0x0100, &mut buf);
        assert_eq!(h.wait().unwrap(), msg);
    }

    #[test]
    fn thread_comm_fifo_order() {
        let c0 = ThreadComm::new(0, 2);
        let c1 = ThreadComm::new(1, 2);

        for i in 0..10u8 {
            let _ = c0.isend(1, 0x0101, &[i]);
        }
        let mut out = Vec::new();
        for _ in 0..10 {
            let mut b = [0u8; 1];
            let h = c1.irecv(0, 0x0101, &mut b);
            out.push(h.wait().unwrap()[0]);
        }
        assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
    }

    #[test]
    fn no_comm_is_serial() {
        let c = NoComm;
        assert!(c.is_no_comm());
        assert_eq!(c.rank(), 0);
        assert_eq!(c.size(), 1);
    }
}
