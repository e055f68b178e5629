/// Ping-pong pair. The front is the committed state read by every stage, the
/// back only receives results and becomes the front on [`PingPong::swap`].
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    buffers: [Vec<T>; 2],
    front: usize,
}

impl<T: Clone> PingPong<T> {
    pub fn new(initial: Vec<T>) -> Self {
        let back = initial.clone();
        Self {
            buffers: [initial, back],
            front: 0,
        }
    }
}

impl<T> PingPong<T> {
    pub fn front(&self) -> &[T] {
        &self.buffers[self.front]
    }

    pub fn back_mut(&mut self) -> &mut [T] {
        &mut self.buffers[1 - self.front]
    }

    /// Front for reading and back for writing at the same time.
    pub fn split(&mut self) -> (&[T], &mut [T]) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.front == 0 {
            (first[0].as_slice(), second[0].as_mut_slice())
        } else {
            (second[0].as_slice(), first[0].as_mut_slice())
        }
    }

    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }
}
