mod logger;

pub(crate) use logger::init_logger;
