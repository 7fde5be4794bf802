mod network_detail;
mod network_list;
mod ssh_keys;
mod template_list;
mod vm_detail;
mod vm_list;

pub use network_detail::NetworkDetailView;
pub use network_list::NetworkListView;
pub use ssh_keys::SshKeysView;
pub use template_list::TemplateListView;
pub use vm_detail::VmDetailView;
pub use vm_list::VmListView;
