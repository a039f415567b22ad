pub mod list_query;

pub use list_query::{
    compare_documents, distinct_counterparties, filter_and_sort_documents, filter_documents,
    paginate, sort_documents, summarize, AmountBucket, Filter, ListParams, ListQuery,
    ListSummary, Page, SortDirection, SortField, SortMode,
};
