use crate::reader::SourceError;

/// Observable changes produced by an [`IncrementalLogCollection`]
///
/// Returned from `pump` in the order they happened; the collection never
/// mutates its visible items from any other thread.
///
/// [`IncrementalLogCollection`]: super::IncrementalLogCollection
#[derive(Debug)]
pub enum CollectionEvent {
    /// Some operation started while idle (`true`) or the last one finished (`false`)
    LoadingChanged(bool),
    /// The visible sequence was emptied
    Reset,
    /// `count` items were appended starting at visible position `start`
    ItemsAppended { start: usize, count: usize },
    /// A growing source now has `total` lines
    SourceGrew { total: usize },
    /// Opening or reading the source failed
    Error(SourceError),
}
