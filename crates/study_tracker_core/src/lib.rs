pub mod append_log;
pub mod coercion;
pub mod domain;
pub mod ports;
pub mod progress;
pub mod service;

pub use append_log::{CommentSubmission, StudySubmission, ValidationError};
pub use coercion::CoercionError;
pub use domain::{
    Cell, ChartSeries, CommentEntry, Guestbook, PageGoal, ProgressPoint, ProgressSummary, Record,
    StudyEntry, StudyProgress, Table,
};
pub use ports::{Clock, PortError, PortResult, SystemClock, TableStore};
pub use service::{Dashboard, DashboardService, ServiceError, Worksheets, WriteMode};
