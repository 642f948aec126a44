// file: src/testing.rs
// version: 1.1.0
// guid: 19728e93-6211-439b-8736-ca1b51014ddb

//! Test doubles for the command executor, the host and distributions

use crate::config::BootloaderApproach;
use crate::distro::{write_etc_hostname, ChrootContext, DistroStrategy};
use crate::error::BootstrapError;
use crate::executor::{CommandExecutor, Invocation};
use crate::host::Host;
use crate::Result;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

type MountTable = Rc<RefCell<Vec<String>>>;
type Hook = Box<dyn Fn(&Invocation)>;

struct ScriptedFailure {
    pattern: String,
    anywhere: bool,
    remaining: u32,
    exit_code: i32,
}

impl ScriptedFailure {
    fn matches(&self, command: &str) -> bool {
        if self.anywhere {
            command.contains(&self.pattern)
        } else {
            command.starts_with(&self.pattern)
        }
    }
}

/// Records invocations instead of running anything
#[derive(Default)]
pub struct RecordingExecutor {
    invocations: RefCell<Vec<Invocation>>,
    responses: RefCell<Vec<(String, String)>>,
    failures: RefCell<Vec<ScriptedFailure>>,
    hook: RefCell<Option<Hook>>,
    mounts: RefCell<Option<MountTable>>,
    interrupt_after: RefCell<Option<String>>,
    interrupt_pending: Cell<bool>,
    suspended: Cell<usize>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(Invocation::command_line)
            .collect()
    }

    /// Output for captured commands whose command line starts with `prefix`
    pub fn respond(&self, prefix: &str, output: &str) {
        self.responses
            .borrow_mut()
            .push((prefix.to_string(), output.to_string()));
    }

    /// Fail the next `times` commands starting with `prefix`
    pub fn fail_when(&self, prefix: &str, times: u32, exit_code: i32) {
        self.failures.borrow_mut().push(ScriptedFailure {
            pattern: prefix.to_string(),
            anywhere: false,
            remaining: times,
            exit_code,
        });
    }

    /// Fail the next `times` commands containing `fragment`
    pub fn fail_when_contains(&self, fragment: &str, times: u32, exit_code: i32) {
        self.failures.borrow_mut().push(ScriptedFailure {
            pattern: fragment.to_string(),
            anywhere: true,
            remaining: times,
            exit_code,
        });
    }

    /// Called for every invocation before it is answered
    pub fn set_hook<F>(&self, hook: F)
    where
        F: Fn(&Invocation) + 'static,
    {
        *self.hook.borrow_mut() = Some(Box::new(hook));
    }

    /// Leave an interrupt pending once a command containing `fragment` was
    /// launched, the way Ctrl+C does while that command runs
    pub fn interrupt_after(&self, fragment: &str) {
        *self.interrupt_after.borrow_mut() = Some(fragment.to_string());
    }

    /// Make mount and umount calls update the host's mount table
    pub fn follow_mounts_of(&self, host: &FakeHost) {
        *self.mounts.borrow_mut() = Some(Rc::clone(&host.mounts));
    }

    fn record(&self, invocation: &Invocation) -> Result<()> {
        if self.suspended.get() == 0 && self.interrupt_pending.replace(false) {
            return Err(BootstrapError::Interrupted);
        }

        self.invocations.borrow_mut().push(invocation.clone());
        if let Some(hook) = self.hook.borrow().as_ref() {
            hook(invocation);
        }

        let command = invocation.command_line();
        let interrupted_here = self
            .interrupt_after
            .borrow()
            .as_deref()
            .map_or(false, |fragment| command.contains(fragment));
        if interrupted_here {
            *self.interrupt_after.borrow_mut() = None;
            self.interrupt_pending.set(true);
        }
        if let Some(failure) = self
            .failures
            .borrow_mut()
            .iter_mut()
            .find(|f| f.remaining > 0 && f.matches(&command))
        {
            failure.remaining -= 1;
            return Err(BootstrapError::CommandFailed {
                command,
                exit_code: Some(failure.exit_code),
            });
        }

        if let Some(mounts) = self.mounts.borrow().as_ref() {
            let last = invocation.argv.last().cloned().unwrap_or_default();
            match invocation.program() {
                "mount" => mounts.borrow_mut().push(last),
                "umount" => mounts.borrow_mut().retain(|m| *m != last),
                _ => {}
            }
        }
        Ok(())
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        self.record(invocation)
    }

    fn run_capture(&self, invocation: &Invocation) -> Result<String> {
        self.record(invocation)?;
        let command = invocation.command_line();
        Ok(self
            .responses
            .borrow()
            .iter()
            .rev()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }

    fn suspend_interrupts(&self) {
        self.suspended.set(self.suspended.get() + 1);
    }

    fn resume_interrupts(&self) {
        self.suspended.set(self.suspended.get().saturating_sub(1));
    }
}

/// A host without privileges, sleeping or real devices
pub struct FakeHost {
    mounts: MountTable,
    paths: RefCell<Vec<PathBuf>>,
    hidden_commands: RefCell<Vec<String>>,
    sleeps: RefCell<Vec<Duration>>,
    hostnames: RefCell<Vec<String>>,
    block_device: Cell<bool>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            mounts: MountTable::default(),
            paths: RefCell::default(),
            hidden_commands: RefCell::default(),
            sleeps: RefCell::default(),
            hostnames: RefCell::default(),
            block_device: Cell::new(true),
        }
    }
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mount(&self, mount_point: &str) {
        self.mounts.borrow_mut().push(mount_point.to_string());
    }

    pub fn mounts(&self) -> Vec<String> {
        self.mounts.borrow().clone()
    }

    /// Make a path exist that does not exist on the real file system
    pub fn add_path(&self, path: &str) {
        self.paths.borrow_mut().push(PathBuf::from(path));
    }

    pub fn hide_command(&self, name: &str) {
        self.hidden_commands.borrow_mut().push(name.to_string());
    }

    pub fn set_block_device(&self, is_block_device: bool) {
        self.block_device.set(is_block_device);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    /// Host names passed to namespace entry
    pub fn hostnames(&self) -> Vec<String> {
        self.hostnames.borrow().clone()
    }
}

impl Host for FakeHost {
    fn enter_namespaces(&self, hostname: &str) -> Result<()> {
        self.hostnames.borrow_mut().push(hostname.to_string());
        Ok(())
    }

    fn read_mount_info(&self) -> Result<String> {
        Ok(self
            .mounts
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, path)| format!("{id} 1 0:{id} / {path} rw - tmpfs tmpfs rw\n", id = i + 20))
            .collect())
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.paths.borrow().iter().any(|p| p == path) || path.exists()
    }

    fn is_block_device(&self, _path: &Path) -> Result<bool> {
        Ok(self.block_device.get())
    }

    fn find_command(&self, name: &str) -> Option<PathBuf> {
        if self.hidden_commands.borrow().iter().any(|c| c == name) {
            return None;
        }
        Some(Path::new("/usr/bin").join(name))
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// A distribution that records which steps the engine asked for
pub struct FakeDistro {
    calls: Rc<RefCell<Vec<String>>>,
    selections: Rc<Cell<u32>>,
    fail_bootstrap: bool,
    leave_mount: bool,
    systemd_resolved: bool,
}

impl Default for FakeDistro {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDistro {
    pub const GENERATED_GRUB_CFG: &'static str =
        "menuentry 'Fake' {\n\tlinux /vmlinuz root=/dev/sda1 ro quiet\n}\n";

    pub fn new() -> Self {
        Self {
            calls: Rc::default(),
            selections: Rc::default(),
            fail_bootstrap: false,
            leave_mount: false,
            systemd_resolved: false,
        }
    }

    /// Shared view of the recorded calls
    pub fn calls(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.calls)
    }

    /// How often the preferred bootloader was asked for
    pub fn selections(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.selections)
    }

    pub fn fail_directory_bootstrap(&mut self) {
        self.fail_bootstrap = true;
    }

    /// Mount proc below the root during bootstrap, as some tools do
    pub fn leave_mount_behind(&mut self) {
        self.leave_mount = true;
    }

    pub fn use_systemd_resolved(&mut self) {
        self.systemd_resolved = true;
    }

    fn called(&self, name: &str) -> Result<()> {
        self.calls.borrow_mut().push(name.to_string());
        Ok(())
    }
}

impl DistroStrategy for FakeDistro {
    fn distro_key(&self) -> &str {
        "fake"
    }

    fn distro_name_long(&self) -> &str {
        "Fake Linux"
    }

    fn select_bootloader(&self) -> BootloaderApproach {
        self.selections.set(self.selections.get() + 1);
        BootloaderApproach::ChrootGrub2Drive
    }

    fn commands_to_check_for(&self) -> Vec<String> {
        vec!["fakestrap".to_string()]
    }

    fn configure_hostname(&self, ctx: &ChrootContext<'_>, hostname: &str) -> Result<()> {
        self.called("configure_hostname")?;
        write_etc_hostname(ctx.root, hostname)
    }

    fn allow_autostart_of_services(&self, _ctx: &ChrootContext<'_>, allow: bool) -> Result<()> {
        self.called(&format!("allow_autostart({})", allow))
    }

    fn run_directory_bootstrap(
        &self,
        ctx: &ChrootContext<'_>,
        _architecture: &str,
        _approach: BootloaderApproach,
    ) -> Result<()> {
        self.called("run_directory_bootstrap")?;
        if self.leave_mount {
            ctx.executor.run(&Invocation::new([
                "mount".to_string(),
                "-t".to_string(),
                "proc".to_string(),
                "proc".to_string(),
                ctx.path("proc").display().to_string(),
            ]))?;
        }
        if self.fail_bootstrap {
            return Err(BootstrapError::validation("fakestrap failed"));
        }
        fs::create_dir_all(ctx.path("etc/cloud/cloud.cfg.d"))?;
        fs::write(ctx.path("etc/cloud/cloud.cfg"), "system_info: {}\n")?;
        fs::create_dir_all(ctx.path("etc/ssh"))?;
        fs::create_dir_all(ctx.path("root"))?;
        Ok(())
    }

    fn create_network_configuration(&self, _ctx: &ChrootContext<'_>, use_mtu: Option<bool>) -> Result<()> {
        self.called(&format!("create_network_configuration({:?})", use_mtu))
    }

    fn ensure_chroot_has_grub2_installed(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("ensure_chroot_has_grub2_installed")
    }

    fn chroot_command_grub2_install(&self) -> &str {
        "grub-install"
    }

    fn generate_grub_cfg_from_inside_chroot(&self, ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("generate_grub_cfg")?;
        fs::create_dir_all(ctx.path("boot/grub"))?;
        fs::write(ctx.path("boot/grub/grub.cfg"), Self::GENERATED_GRUB_CFG)?;
        Ok(())
    }

    fn generate_initramfs_from_inside_chroot(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("generate_initramfs")
    }

    fn perform_in_chroot_shipping_clean_up(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("shipping_clean_up")
    }

    fn perform_post_chroot_clean_up(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("post_chroot_clean_up")
    }

    fn install_dhcp_client(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("install_dhcp_client")
    }

    fn install_sudo(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("install_sudo")
    }

    fn install_cloud_init_and_friends(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("install_cloud_init")
    }

    fn cloud_init_datasource_cfg_path(&self) -> &str {
        "/etc/cloud/cloud.cfg.d/90_fake.cfg"
    }

    fn install_sshd(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("install_sshd")
    }

    fn make_openstack_services_autostart(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("make_openstack_services_autostart")
    }

    fn vmlinuz_path(&self) -> &str {
        "/boot/vmlinuz"
    }

    fn initramfs_path(&self) -> &str {
        "/boot/initramfs.img"
    }

    fn install_kernel(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        self.called("install_kernel")
    }

    fn uses_systemd(&self) -> bool {
        true
    }

    fn uses_systemd_resolved(&self, _with_openstack: bool) -> bool {
        self.systemd_resolved
    }

    fn minimum_size_bytes(&self) -> u64 {
        1024 * 1024 * 1024
    }
}
