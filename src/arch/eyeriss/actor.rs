// Actor-backed PE: each PE runs on its own thread behind a single-consumer channel

use super::instruction::Opcode;
use super::message::Message;
use super::pe::{Endpoint, PeSnapshot, ProcessingElement};
use super::tensor::Payload;
use crate::error::{EyerissError, Result};
use crate::simulator::config::PeConfig;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

enum Request {
  /// `reply` is set only for read-type instructions
  Deliver {
    message: Message,
    reply: Option<Sender<Result<Option<Payload>>>>,
  },
  Snapshot(Sender<Result<PeSnapshot>>),
  Flush(Sender<Result<()>>),
}

/// Handle to a PE task.
///
/// Reads are request/reply; writes, COMPUTE and ADD_PSUM are fire-and-forget.
/// An error raised by a fire-and-forget request is held by the task and
/// returned on its next reply. Dropping the handle terminates and joins the
/// task.
pub struct PeActor {
  id: usize,
  tx: Sender<Request>,
  handle: Option<JoinHandle<()>>,
}

impl PeActor {
  pub fn start(id: usize, config: &PeConfig) -> Result<Self> {
    let (tx, rx) = mpsc::channel();
    let pe = ProcessingElement::new(id, config);
    let handle = thread::Builder::new()
      .name(format!("pe-{}", id))
      .spawn(move || run(pe, rx))?;
    log::debug!("PE {} task started", id);
    Ok(Self {
      id,
      tx,
      handle: Some(handle),
    })
  }

  fn request<T>(&self, build: impl FnOnce(Sender<Result<T>>) -> Request) -> Result<T> {
    let disconnected = || EyerissError::Disconnected { id: self.id };
    let (reply_tx, reply_rx) = mpsc::channel();
    self.tx.send(build(reply_tx)).map_err(|_| disconnected())?;
    reply_rx.recv().map_err(|_| disconnected())?
  }

  /// True while the task is alive
  pub fn is_running(&self) -> bool {
    self.handle.as_ref().is_some_and(|h| !h.is_finished())
  }
}

fn run(mut pe: ProcessingElement, rx: Receiver<Request>) {
  let mut deferred: Option<EyerissError> = None;

  while let Ok(request) = rx.recv() {
    match request {
      Request::Deliver { message, reply } => {
        let result = pe.handle(&message);
        match reply {
          Some(reply) => {
            let result = match deferred.take() {
              Some(err) => Err(err),
              None => result,
            };
            let _ = reply.send(result);
          },
          None => {
            if let Err(err) = result {
              log::warn!("PE {}: {} failed: {}", pe.id(), message.instruction().name(), err);
              if deferred.is_none() {
                deferred = Some(err);
              }
            }
          },
        }
        if message.opcode() == Opcode::Terminate {
          break;
        }
      },
      Request::Snapshot(reply) => {
        let result = match deferred.take() {
          Some(err) => Err(err),
          None => pe.snapshot(),
        };
        let _ = reply.send(result);
      },
      Request::Flush(reply) => {
        let result = match deferred.take() {
          Some(err) => Err(err),
          None => Ok(()),
        };
        let _ = reply.send(result);
      },
    }
  }
  log::debug!("PE {} task stopped", pe.id());
}

impl Endpoint for PeActor {
  fn spawn(id: usize, config: &PeConfig) -> Result<Self> {
    Self::start(id, config)
  }

  fn id(&self) -> usize {
    self.id
  }

  fn deliver(&mut self, message: &Message) -> Result<Option<Payload>> {
    if message.instruction().is_read() {
      let message = message.clone();
      return self.request(|reply| Request::Deliver {
        message,
        reply: Some(reply),
      });
    }
    self
      .tx
      .send(Request::Deliver {
        message: message.clone(),
        reply: None,
      })
      .map_err(|_| EyerissError::Disconnected { id: self.id })?;
    Ok(None)
  }

  fn snapshot(&self) -> Result<PeSnapshot> {
    self.request(Request::Snapshot)
  }

  fn flush(&mut self) -> Result<()> {
    self.request(Request::Flush)
  }
}

impl Drop for PeActor {
  fn drop(&mut self) {
    let _ = self.tx.send(Request::Deliver {
      message: Message::terminate(),
      reply: None,
    });
    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        log::error!("PE {} task panicked", self.id);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::eyeriss::address::Address;
  use crate::arch::eyeriss::pe::row_address;
  use ndarray::array;

  #[test]
  fn test_request_reply() {
    let mut actor = PeActor::start(3, &PeConfig::default()).unwrap();
    assert_eq!(actor.id(), 3);
    assert!(actor.is_running());

    actor.deliver(&Message::write_ifmap(row_address(), array![1.0, 2.0, 3.0])).unwrap();
    actor.deliver(&Message::write_filter(row_address(), array![1.0, 1.0])).unwrap();
    assert_eq!(actor.deliver(&Message::compute()).unwrap(), None);

    let psum = actor.deliver(&Message::read_psum(row_address())).unwrap();
    assert_eq!(psum, Some(array![3.0, 5.0]));

    let snap = actor.snapshot().unwrap();
    assert_eq!(snap.filter, array![1.0, 1.0]);
    assert_eq!(snap.psum, array![3.0, 5.0]);
  }

  #[test]
  fn test_fire_and_forget_error_surfaces_on_next_reply() {
    let mut actor = PeActor::start(0, &PeConfig::default()).unwrap();
    actor
      .deliver(&Message::write_ifmap(Address::from((0, 99)), array![1.0]))
      .unwrap();
    assert!(matches!(actor.flush(), Err(EyerissError::Address(_))));
    // reported once
    assert!(actor.flush().is_ok());
  }

  #[test]
  fn test_terminate_stops_task() {
    let mut actor = PeActor::start(1, &PeConfig::default()).unwrap();
    actor.deliver(&Message::terminate()).unwrap();
    assert!(matches!(actor.snapshot(), Err(EyerissError::Disconnected { id: 1 })));
    assert!(matches!(actor.flush(), Err(EyerissError::Disconnected { id: 1 })));
  }
}
