//! Collective communication between distributed workers
//!
//! Workers share no memory. Everything they exchange goes through a
//! [`Communicator`], whose operations are collectives: every worker must
//! call the same operation in the same order, and each call blocks until
//! the collective completes.
//!
//! [`ChannelCommunicator`] realizes this over crossbeam channels in a star
//! rooted at rank 0. Reductions are summed at the root in rank order, so
//! every worker observes the same bits.

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

/// Transport failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommError {
    /// The peer's end of the channel is gone
    #[error("Peer worker disconnected")]
    Disconnected,

    /// A packet of the wrong kind arrived
    #[error("Unexpected packet: expected {expected}, got {actual}")]
    UnexpectedPacket {
        /// Kind the collective was waiting for
        expected: &'static str,
        /// Kind that arrived
        actual: &'static str,
    },

    /// A buffer arrived with the wrong length
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length the local side holds
        expected: usize,
        /// Length the peer sent
        actual: usize,
    },
}

/// Wire messages between workers
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Vertex count broadcast
    Count(usize),
    /// Out-edge slice for a partition
    Edges(Vec<Vec<u32>>),
    /// Element-wise reduction operand or result
    Values(Vec<f64>),
    /// Scalar reduction operand or result
    Scalar(f64),
    /// Logical-OR reduction operand or result
    Flag(bool),
    /// Gathered rank slice
    Ranks(Vec<f64>),
}

impl Packet {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Count(_) => "count",
            Self::Edges(_) => "edges",
            Self::Values(_) => "values",
            Self::Scalar(_) => "scalar",
            Self::Flag(_) => "flag",
            Self::Ranks(_) => "ranks",
        }
    }
}

/// Collective operations available to a worker
pub trait Communicator {
    /// This worker's rank in `0..size`
    fn rank(&self) -> usize;

    /// Number of workers
    fn size(&self) -> usize;

    /// Root supplies `count`; every worker returns it
    ///
    /// # Errors
    ///
    /// Returns [`CommError`] if the transport fails
    fn broadcast_count(&self, count: usize) -> Result<usize, CommError>;

    /// Root ships a partition's out-edges to worker `to`
    ///
    /// # Errors
    ///
    /// Returns [`CommError`] if the transport fails
    fn send_edges(&self, to: usize, edges: Vec<Vec<u32>>) -> Result<(), CommError>;

    /// Non-root worker receives its out-edges from the root
    ///
    /// # Errors
    ///
    /// Returns [`CommError`] if the transport fails
    fn recv_edges(&self) -> Result<Vec<Vec<u32>>, CommError>;

    /// Element-wise sum of `values` across workers, written back in place
    ///
    /// # Errors
    ///
    /// Returns [`CommError`] if the transport fails or lengths differ
    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), CommError>;

    /// Sum of `value` across workers
    ///
    /// # Errors
    ///
    /// Returns [`CommError`] if the transport fails
    fn all_reduce_scalar(&self, value: f64) -> Result<f64, CommError>;

    /// Logical OR of `flag` across workers
    ///
    /// # Errors
    ///
    /// Returns [`CommError`] if the transport fails
    fn all_reduce_or(&self, flag: bool) -> Result<bool, CommError>;

    /// Concatenate every worker's `local` slice at the root, in rank order
    ///
    /// Returns `Some` at the root and `None` elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`CommError`] if the transport fails
    fn gather(&self, local: &[f64]) -> Result<Option<Vec<f64>>, CommError>;
}

#[derive(Debug)]
enum Links {
    Root {
        from_workers: Vec<Receiver<Packet>>,
        to_workers: Vec<Sender<Packet>>,
    },
    Leaf {
        to_root: Sender<Packet>,
        from_root: Receiver<Packet>,
    },
}

/// Star-topology communicator over crossbeam channels
#[derive(Debug)]
pub struct ChannelCommunicator {
    rank: usize,
    size: usize,
    links: Links,
}

impl ChannelCommunicator {
    /// One connected communicator per worker, indexed by rank
    #[must_use]
    pub fn star(size: usize) -> Vec<Self> {
        let size = size.max(1);
        let mut from_workers = Vec::with_capacity(size - 1);
        let mut to_workers = Vec::with_capacity(size - 1);
        let mut leaves = Vec::with_capacity(size - 1);

        for rank in 1..size {
            let (up_tx, up_rx) = unbounded();
            let (down_tx, down_rx) = unbounded();
            from_workers.push(up_rx);
            to_workers.push(down_tx);
            leaves.push(Self {
                rank,
                size,
                links: Links::Leaf {
                    to_root: up_tx,
                    from_root: down_rx,
                },
            });
        }

        let root = Self {
            rank: 0,
            size,
            links: Links::Root {
                from_workers,
                to_workers,
            },
        };

        std::iter::once(root).chain(leaves).collect()
    }

    fn send(sender: &Sender<Packet>, packet: Packet) -> Result<(), CommError> {
        sender.send(packet).map_err(|_| CommError::Disconnected)
    }

    fn recv(receiver: &Receiver<Packet>) -> Result<Packet, CommError> {
        receiver.recv().map_err(|_| CommError::Disconnected)
    }

    /// Root: fold every worker's packet into `acc` in rank order, then send
    /// `reply(acc)` back down. Leaf: send `packet` up and return the reply.
    fn reduce<T>(
        &self,
        mut acc: T,
        packet: impl FnOnce(&T) -> Packet,
        mut fold: impl FnMut(&mut T, Packet) -> Result<(), CommError>,
        reply: impl Fn(&T) -> Packet,
    ) -> Result<Packet, CommError> {
        match &self.links {
            Links::Root {
                from_workers,
                to_workers,
            } => {
                for receiver in from_workers {
                    fold(&mut acc, Self::recv(receiver)?)?;
                }
                let result = reply(&acc);
                for sender in to_workers {
                    Self::send(sender, result.clone())?;
                }
                Ok(result)
            }
            Links::Leaf { to_root, from_root } => {
                Self::send(to_root, packet(&acc))?;
                Self::recv(from_root)
            }
        }
    }
}

fn unexpected(expected: &'static str, actual: &Packet) -> CommError {
    CommError::UnexpectedPacket {
        expected,
        actual: actual.kind(),
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_count(&self, count: usize) -> Result<usize, CommError> {
        match &self.links {
            Links::Root { to_workers, .. } => {
                for sender in to_workers {
                    Self::send(sender, Packet::Count(count))?;
                }
                Ok(count)
            }
            Links::Leaf { from_root, .. } => match Self::recv(from_root)? {
                Packet::Count(count) => Ok(count),
                other => Err(unexpected("count", &other)),
            },
        }
    }

    fn send_edges(&self, to: usize, edges: Vec<Vec<u32>>) -> Result<(), CommError> {
        match &self.links {
            Links::Root { to_workers, .. } => {
                let sender = to
                    .checked_sub(1)
                    .and_then(|index| to_workers.get(index))
                    .ok_or(CommError::Disconnected)?;
                Self::send(sender, Packet::Edges(edges))
            }
            Links::Leaf { .. } => Err(CommError::UnexpectedPacket {
                expected: "root sender",
                actual: "edges",
            }),
        }
    }

    fn recv_edges(&self) -> Result<Vec<Vec<u32>>, CommError> {
        match &self.links {
            Links::Leaf { from_root, .. } => match Self::recv(from_root)? {
                Packet::Edges(edges) => Ok(edges),
                other => Err(unexpected("edges", &other)),
            },
            Links::Root { .. } => Err(CommError::UnexpectedPacket {
                expected: "leaf receiver",
                actual: "edges",
            }),
        }
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), CommError> {
        let len = values.len();
        let reduced = self.reduce(
            values.to_vec(),
            |acc| Packet::Values(acc.clone()),
            |acc, packet| match packet {
                Packet::Values(part) if part.len() == len => {
                    for (slot, value) in acc.iter_mut().zip(part) {
                        *slot += value;
                    }
                    Ok(())
                }
                Packet::Values(part) => Err(CommError::LengthMismatch {
                    expected: len,
                    actual: part.len(),
                }),
                other => Err(unexpected("values", &other)),
            },
            |acc| Packet::Values(acc.clone()),
        )?;

        match reduced {
            Packet::Values(sum) if sum.len() == len => {
                values.copy_from_slice(&sum);
                Ok(())
            }
            Packet::Values(sum) => Err(CommError::LengthMismatch {
                expected: len,
                actual: sum.len(),
            }),
            other => Err(unexpected("values", &other)),
        }
    }

    fn all_reduce_scalar(&self, value: f64) -> Result<f64, CommError> {
        let reduced = self.reduce(
            value,
            |acc| Packet::Scalar(*acc),
            |acc, packet| match packet {
                Packet::Scalar(part) => {
                    *acc += part;
                    Ok(())
                }
                other => Err(unexpected("scalar", &other)),
            },
            |acc| Packet::Scalar(*acc),
        )?;

        match reduced {
            Packet::Scalar(sum) => Ok(sum),
            other => Err(unexpected("scalar", &other)),
        }
    }

    fn all_reduce_or(&self, flag: bool) -> Result<bool, CommError> {
        let reduced = self.reduce(
            flag,
            |acc| Packet::Flag(*acc),
            |acc, packet| match packet {
                Packet::Flag(part) => {
                    *acc |= part;
                    Ok(())
                }
                other => Err(unexpected("flag", &other)),
            },
            |acc| Packet::Flag(*acc),
        )?;

        match reduced {
            Packet::Flag(any) => Ok(any),
            other => Err(unexpected("flag", &other)),
        }
    }

    fn gather(&self, local: &[f64]) -> Result<Option<Vec<f64>>, CommError> {
        match &self.links {
            Links::Root { from_workers, .. } => {
                let mut all = local.to_vec();
                for receiver in from_workers {
                    match Self::recv(receiver)? {
                        Packet::Ranks(part) => all.extend(part),
                        other => return Err(unexpected("ranks", &other)),
                    }
                }
                Ok(Some(all))
            }
            Links::Leaf { to_root, .. } => {
                Self::send(to_root, Packet::Ranks(local.to_vec()))?;
                Ok(None)
            }
        }
    }
}
