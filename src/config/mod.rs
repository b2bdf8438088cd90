mod ignore;

pub use ignore::IgnoreSet;
