pub mod device_map;
pub mod watch_list;

pub use device_map::DeviceMap;
pub use watch_list::WatchList;
