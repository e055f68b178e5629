/// Types with a `#[repr(C)]` twin that can be handed to a host as bytes.
///
/// The raw layouts follow GPU buffer rules (16 byte rows for vectors in
/// constant blocks), so they can be uploaded unchanged.
pub trait HostBufferData {
    type RawType: bytemuck::Pod;
    fn to_raw(&self) -> Self::RawType;
}
