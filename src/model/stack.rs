use std::fmt;
use std::sync::Arc;

use crate::image_pipeline::{Blob, DecodeError, DecodedSlice, PixelBuffer, SliceDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StackId(pub(crate) u64);

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("slice {index} is out of range for stack `{name}` ({len} slice(s))")]
    SliceOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },

    #[error("stack `{0}` is finalized; no further slices can be appended")]
    Finalized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeTicket {
    pub stack: StackId,
    pub index: usize,
    pub revision: u64,
}

#[derive(Debug, Clone)]
struct RawSlice {
    bytes: Arc<[u8]>,
    revision: u64,
}

#[derive(Debug, Clone)]
struct CachedPixels {
    index: usize,
    pixels: Arc<PixelBuffer>,
}

/// One image series with its raw, blob and pixel representations.
///
/// `blob_data[i]` is only ever derived from `raw_data[i]`, and `blob_data`
/// never grows past `raw_data`. At most one pixel buffer is cached: the one
/// for the most recently decoded slice.
#[derive(Debug)]
pub struct Stack {
    id: StackId,
    name: String,
    view: ViewHandle,
    raw_data: Vec<RawSlice>,
    blob_data: Vec<Option<Blob>>,
    pixel_data: Option<CachedPixels>,
    finalized: bool,
    next_revision: u64,
}

impl Stack {
    pub(crate) fn new(id: StackId, name: String, view: ViewHandle) -> Self {
        Self {
            id,
            name,
            view,
            raw_data: Vec::new(),
            blob_data: Vec::new(),
            pixel_data: None,
            finalized: false,
            next_revision: 0,
        }
    }

    pub fn id(&self) -> StackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> ViewHandle {
        self.view
    }

    pub fn len(&self) -> usize {
        self.raw_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_data.is_empty()
    }

    pub fn blob_len(&self) -> usize {
        self.blob_data.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn raw(&self, index: usize) -> Option<&[u8]> {
        self.raw_data.get(index).map(|slice| &*slice.bytes)
    }

    pub fn cached_blob(&self, index: usize) -> Option<&Blob> {
        self.blob_data.get(index).and_then(Option::as_ref)
    }

    pub fn cached_pixels(&self) -> Option<(usize, &PixelBuffer)> {
        self.pixel_data
            .as_ref()
            .map(|cached| (cached.index, cached.pixels.as_ref()))
    }

    pub fn append_raw(&mut self, bytes: impl Into<Arc<[u8]>>) -> Result<usize, StackError> {
        if self.finalized {
            return Err(StackError::Finalized(self.name.clone()));
        }
        let revision = self.bump_revision();
        self.raw_data.push(RawSlice {
            bytes: bytes.into(),
            revision,
        });
        Ok(self.raw_data.len() - 1)
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn replace_raw(
        &mut self,
        index: usize,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<(), StackError> {
        self.check_index(index)?;
        let revision = self.bump_revision();
        self.raw_data[index] = RawSlice {
            bytes: bytes.into(),
            revision,
        };
        self.invalidate(index);
        Ok(())
    }

    pub fn ensure_blob<D: SliceDecoder + ?Sized>(
        &mut self,
        index: usize,
        decoder: &D,
    ) -> Result<Blob, StackError> {
        self.check_index(index)?;
        if let Some(Some(blob)) = self.blob_data.get(index) {
            log::debug!("blob cache hit for `{}` slice {index}", self.name);
            return Ok(blob.clone());
        }

        let blob = decoder.to_blob(&self.raw_data[index].bytes)?;
        self.store_blob(index, blob.clone());
        Ok(blob)
    }

    pub fn ensure_pixels<D: SliceDecoder + ?Sized>(
        &mut self,
        index: usize,
        decoder: &D,
    ) -> Result<Arc<PixelBuffer>, StackError> {
        self.check_index(index)?;
        if let Some(cached) = self.pixel_data.as_ref().filter(|cached| cached.index == index) {
            log::debug!("pixel cache hit for `{}` slice {index}", self.name);
            return Ok(Arc::clone(&cached.pixels));
        }

        let blob = self.ensure_blob(index, decoder)?;
        let pixels = Arc::new(decoder.to_pixels(&blob)?);
        self.pixel_data = Some(CachedPixels {
            index,
            pixels: Arc::clone(&pixels),
        });
        Ok(pixels)
    }

    pub fn invalidate(&mut self, index: usize) {
        if let Some(slot) = self.blob_data.get_mut(index) {
            *slot = None;
        }
        if self
            .pixel_data
            .as_ref()
            .is_some_and(|cached| cached.index == index)
        {
            self.pixel_data = None;
        }
    }

    pub fn decode_ticket(&self, index: usize) -> Result<(DecodeTicket, Arc<[u8]>), StackError> {
        self.check_index(index)?;
        let slice = &self.raw_data[index];
        let ticket = DecodeTicket {
            stack: self.id,
            index,
            revision: slice.revision,
        };
        Ok((ticket, Arc::clone(&slice.bytes)))
    }

    /// Stores a background decode result. Returns `false` and leaves the
    /// stack untouched when the ticket no longer matches this stack's slice.
    pub fn apply_decoded(&mut self, ticket: DecodeTicket, decoded: DecodedSlice) -> bool {
        if ticket.stack != self.id {
            return false;
        }
        let current = self.raw_data.get(ticket.index).map(|slice| slice.revision);
        if current != Some(ticket.revision) {
            return false;
        }

        self.store_blob(ticket.index, decoded.blob);
        self.pixel_data = Some(CachedPixels {
            index: ticket.index,
            pixels: decoded.pixels,
        });
        true
    }

    fn store_blob(&mut self, index: usize, blob: Blob) {
        if self.blob_data.len() <= index {
            self.blob_data.resize_with(index + 1, || None);
        }
        self.blob_data[index] = Some(blob);
    }

    fn check_index(&self, index: usize) -> Result<(), StackError> {
        if index < self.raw_data.len() {
            Ok(())
        } else {
            Err(StackError::SliceOutOfRange {
                name: self.name.clone(),
                index,
                len: self.raw_data.len(),
            })
        }
    }

    fn bump_revision(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }
}
