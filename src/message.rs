use crate::image_pipeline::{DecodeError, DecodedSlice};
use crate::model::{DecodeTicket, LoadedSeries, Outcome, StackId};

#[derive(Debug, Clone)]
pub enum Message {
    PickFiles,
    FilesLoaded(Vec<Result<LoadedSeries, String>>),
    SelectStack(StackId),
    DiscardStack(StackId),
    PreviousSlice,
    NextSlice,
    SliceDecoded(DecodeTicket, Result<DecodedSlice, DecodeError>),
    Submit(Outcome),
}
