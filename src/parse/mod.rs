pub mod submission;

pub use submission::{
    CURVE_TAG, ParsedSubmissions, Reply, SubmissionError, SubmissionIndex, SubmissionLedger,
    SubmissionRequest, ThreadContents, decode_curve_reply, encode_curve_reply, parse_submission,
    parse_submissions, partition_replies, prepare_submission,
};
