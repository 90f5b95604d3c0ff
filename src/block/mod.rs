//! 块设备抽象
//!
//! block/device.rs 定义缓存向下依赖的同步读写原语
//! block/ramdisk.rs 提供一个内存实现，没有真实磁盘时使用

mod device;
mod ramdisk;

pub use device::BlockDevice;
pub use ramdisk::RamDisk;
