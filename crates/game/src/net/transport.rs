use bytes::Bytes;

/// Outbound half of the peer link. Sends are fire-and-forget: no ordering,
/// delivery or acknowledgment is assumed from an implementation.
pub trait Transport {
    fn send(&mut self, payload: Bytes);
}

impl Transport for Vec<Bytes> {
    fn send(&mut self, payload: Bytes) {
        self.push(payload);
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, payload: Bytes) {
        (**self).send(payload);
    }
}
