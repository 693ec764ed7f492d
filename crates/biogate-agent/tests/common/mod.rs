//! Test doubles shared by the agent integration tests.

#![allow(dead_code)]

use biogate_agent::DoorRelay;
use biogate_core::{DeviceSettings, SettingsMap, constants::FRAME_OVERHEAD};
use biogate_protocol::{CommandCode, Response, decode, encode};
use biogate_storage::models::{Attendance, Member, NewAttendance, NewMember};
use biogate_storage::{MembershipRepository, StorageError, StorageResult};
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

pub fn member(id: &str, biometric_id: &str, status: &str) -> Member {
    Member {
        id: id.to_string(),
        name: format!("Member {id}"),
        email: None,
        phone: None,
        plan_name: Some("Monthly".to_string()),
        start_date: None,
        expiry_date: None,
        status: status.to_string(),
        payment_status: Some("paid".to_string()),
        biometric_id: Some(biometric_id.to_string()),
        created_at: Utc::now(),
    }
}

/// In-memory repository with switchable failures.
#[derive(Default)]
pub struct MockRepository {
    pub members: Mutex<Vec<Member>>,
    pub attendance: Mutex<Vec<Attendance>>,
    pub settings: Mutex<SettingsMap>,
    pub fail_members: AtomicBool,
    pub fail_attendance: AtomicBool,
    pub settings_delay: Mutex<Option<Duration>>,
    pub settings_reads: AtomicUsize,
}

impl MockRepository {
    pub fn with_members(members: Vec<Member>) -> Self {
        Self {
            members: Mutex::new(members),
            ..Default::default()
        }
    }

    pub fn attendance_count(&self) -> usize {
        self.attendance.lock().unwrap().len()
    }
}

impl MembershipRepository for MockRepository {
    async fn list_members(&self) -> StorageResult<Vec<Member>> {
        if self.fail_members.load(Ordering::SeqCst) {
            return Err(StorageError::Validation("member list unavailable".into()));
        }
        Ok(self.members.lock().unwrap().clone())
    }

    async fn create_member(&self, new: &NewMember) -> StorageResult<Member> {
        let mut members = self.members.lock().unwrap();
        let mut created = member(
            &format!("member_{:03}", members.len() + 1),
            new.biometric_id.as_deref().unwrap_or_default(),
            &new.status,
        );
        created.name = new.name.clone();
        created.biometric_id = new.biometric_id.clone();
        members.push(created.clone());
        Ok(created)
    }

    async fn create_attendance(&self, record: &NewAttendance) -> StorageResult<Attendance> {
        if self.fail_attendance.load(Ordering::SeqCst) {
            return Err(StorageError::Validation("attendance write failed".into()));
        }

        let mut attendance = self.attendance.lock().unwrap();
        let row = Attendance {
            id: format!("att_{:03}", attendance.len() + 1),
            member_id: record.member_id.clone(),
            check_in_time: record.check_in_time.unwrap_or_else(Utc::now),
            check_out_time: record.check_out_time,
            latitude: record.latitude,
            longitude: record.longitude,
            marked_via: record
                .marked_via
                .clone()
                .unwrap_or_else(|| "manual".to_string()),
        };
        attendance.push(row.clone());
        Ok(row)
    }

    async fn list_attendance(&self) -> StorageResult<Vec<Attendance>> {
        Ok(self.attendance.lock().unwrap().clone())
    }

    async fn get_settings(&self) -> StorageResult<SettingsMap> {
        self.settings_reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.settings_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn update_settings(&self, settings: &SettingsMap) -> StorageResult<SettingsMap> {
        let mut stored = self.settings.lock().unwrap();
        stored.extend(settings.clone());
        Ok(stored.clone())
    }

    async fn link_biometric(&self, member_id: &str, device_user_id: &str) -> StorageResult<Member> {
        let mut members = self.members.lock().unwrap();
        let found = members
            .iter_mut()
            .find(|m| m.id == member_id)
            .ok_or_else(|| StorageError::Validation(format!("no member {member_id}")))?;
        found.biometric_id = Some(device_user_id.to_string());
        Ok(found.clone())
    }
}

/// Relay that records every pulse and answers with a fixed result.
pub struct MockRelay {
    pub pulses: Mutex<Vec<u8>>,
    pub acknowledge: bool,
}

impl MockRelay {
    pub fn new(acknowledge: bool) -> Self {
        Self {
            pulses: Mutex::new(Vec::new()),
            acknowledge,
        }
    }

    pub fn pulses(&self) -> Vec<u8> {
        self.pulses.lock().unwrap().clone()
    }
}

impl DoorRelay for MockRelay {
    async fn unlock(&self, _settings: &DeviceSettings, seconds: u8) -> bool {
        self.pulses.lock().unwrap().push(seconds);
        self.acknowledge
    }
}

pub async fn terminal() -> (TcpListener, DeviceSettings) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, DeviceSettings::new("127.0.0.1").port(port))
}

pub fn record(ts: u32, user: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    out.extend_from_slice(&ts.to_le_bytes());
    out.extend_from_slice(&user.to_le_bytes());
    out.extend_from_slice(&[0, 0]);
    out
}

pub fn reply(command: CommandCode) -> Vec<u8> {
    encode(command.code(), &[], 0).to_vec()
}

/// Read the next request frame from the agent.
pub async fn next_request(stream: &mut TcpStream, pending: &mut Vec<u8>) -> Option<Response> {
    loop {
        if pending.len() >= 6 {
            let command = u32::from_le_bytes([pending[2], pending[3], pending[4], pending[5]]);
            let len = if command == CommandCode::RelayControl.code() {
                FRAME_OVERHEAD + 2
            } else {
                FRAME_OVERHEAD
            };
            if pending.len() >= len {
                let frame: Vec<u8> = pending.drain(..len).collect();
                return decode(&frame);
            }
        }

        let mut chunk = [0u8; 256];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
        }
    }
}
