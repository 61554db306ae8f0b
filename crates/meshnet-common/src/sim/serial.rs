use crate::SerialPort;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Pipe = Rc<RefCell<VecDeque<u8>>>;

/// One end of an in-memory serial cable.
#[derive(Debug, Clone)]
pub struct SimSerial {
    rx: Pipe,
    tx: Pipe,
}

impl SimSerial {
    /// Create both ends of a cable; bytes written to one are read from the other.
    pub fn pair() -> (SimSerial, SimSerial) {
        let a: Pipe = Rc::default();
        let b: Pipe = Rc::default();
        (
            SimSerial {
                rx: a.clone(),
                tx: b.clone(),
            },
            SimSerial { rx: b, tx: a },
        )
    }

    /// Drain every byte waiting on this end.
    pub fn read_all(&mut self) -> Vec<u8> {
        self.rx.borrow_mut().drain(..).collect()
    }

    /// Number of bytes waiting on this end.
    pub fn available(&self) -> usize {
        self.rx.borrow().len()
    }
}

impl SerialPort for SimSerial {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut rx = self.rx.borrow_mut();
        let n = rx.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write(&mut self, data: &[u8]) {
        self.tx.borrow_mut().extend(data.iter().copied());
    }
}
