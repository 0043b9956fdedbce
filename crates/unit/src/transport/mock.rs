use http::StatusCode;
use mockall::mock;

use crate::error::TransportError;
use crate::transport::loopback::LoopbackHandle;
use crate::transport::{Completion, Transport};

mock! {
    pub Native {}

    impl Transport for Native {
        type Handle = LoopbackHandle;

        fn allocate(&self) -> Result<LoopbackHandle, TransportError>;
        fn finalize(&self, handle: LoopbackHandle, completion: Completion);
        fn offer(&self, handle: &LoopbackHandle, buf: &[u8]) -> usize;
        fn init_response(
            &self,
            handle: &LoopbackHandle,
            status: StatusCode,
            field_count: u32,
            fields_size: u32,
        ) -> Result<(), TransportError>;
        fn add_field(&self, handle: &LoopbackHandle, name: &[u8], value: &[u8]) -> Result<(), TransportError>;
        fn send_headers(&self, handle: &LoopbackHandle) -> Result<(), TransportError>;
    }
}
