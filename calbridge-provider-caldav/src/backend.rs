//! Sync backend over a CalDAV calendar home.
//!
//! Maps the sync protocol's folder/item operations onto a [`RemoteStore`].
//! Items fetched by `list_items` are kept in a per-session map keyed by href,
//! which `get_item` and `stat_item` answer from.

use std::collections::HashMap;

use calbridge_core::appointment::Appointment;
use calbridge_core::datetime::format_utc;
use calbridge_core::ics::{decode_appointment, encode_appointment};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::folder::{FolderId, FolderKind, FolderStat, ROOT_FOLDER_ID, SyncFolder};
use crate::store::{Credentials, ETag, Href, Precondition, RemoteItem, RemoteStore};

/// Change-detection record for an item. `etag` changes whenever the item does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStat {
    pub id: String,
    pub flags: u8,
    pub etag: Option<ETag>,
}

impl ItemStat {
    fn for_item(item: &RemoteItem) -> Self {
        ItemStat {
            id: item.href.to_string(),
            flags: 1,
            etag: item.etag.clone(),
        }
    }
}

/// Upper end of every sync window: the last second representable as a
/// signed 32-bit Unix time (2038-01-19T03:14:07Z).
pub fn far_future() -> DateTime<Utc> {
    Utc.timestamp_opt(i64::from(i32::MAX), 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Backend settings that do not depend on the user.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Path of the calendar home; `%u` is replaced by the user name.
    pub calendar_path: String,
    /// Zone for floating and all-day times.
    pub default_timezone: Tz,
}

pub struct CalDavBackend<S> {
    store: S,
    settings: BackendSettings,
    home: Option<Href>,
    items: HashMap<Href, RemoteItem>,
}

impl<S: RemoteStore> CalDavBackend<S> {
    pub fn new(store: S, settings: BackendSettings) -> Self {
        CalDavBackend {
            store,
            settings,
            home: None,
            items: HashMap::new(),
        }
    }

    /// Log on to the user's calendar home. Succeeds when the server allows
    /// PROPFIND there; any failure is reported as `false`.
    pub fn logon(&mut self, username: &str, password: &str) -> bool {
        let home = Href::new(self.settings.calendar_path.replace("%u", username));
        self.store.login(
            home.clone(),
            Credentials {
                username: username.to_string(),
                password: password.to_string(),
            },
        );

        match self.store.options() {
            Ok(methods) if methods.iter().any(|m| m.eq_ignore_ascii_case("PROPFIND")) => {
                tracing::info!(username, "User is authenticated on CalDAV");
                self.home = Some(home);
                true
            }
            Ok(_) => {
                tracing::info!(username, "User is not authenticated on CalDAV");
                false
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "CalDAV logon failed");
                false
            }
        }
    }

    /// Connections are not kept open, so this only forgets the session.
    pub fn logoff(&mut self) -> bool {
        self.home = None;
        self.items.clear();
        true
    }

    fn home(&self) -> BridgeResult<&Href> {
        self.home.as_ref().ok_or(BridgeError::NotLoggedOn)
    }

    fn collection_href(&self, folder: &FolderId) -> BridgeResult<Href> {
        Ok(self.home()?.join_collection(&folder.collection))
    }

    /// Two folders (appointments and tasks) per calendar collection.
    pub fn list_folders(&self) -> BridgeResult<Vec<FolderStat>> {
        tracing::debug!("Getting all folders");
        self.home()?;

        let mut folders = Vec::new();
        for collection in self.store.list_collections()? {
            for kind in [FolderKind::Appointments, FolderKind::Tasks] {
                let id = FolderId::for_collection(kind, &collection.href);
                folders.push(FolderStat::for_folder(&id));
            }
        }
        Ok(folders)
    }

    pub fn get_folder(&self, folder_id: &str) -> BridgeResult<SyncFolder> {
        tracing::debug!(folder_id, "get_folder");
        let folder: FolderId = folder_id.parse()?;
        let details = self.store.collection_details(&self.collection_href(&folder)?)?;

        Ok(SyncFolder {
            server_id: folder.to_string(),
            parent_id: ROOT_FOLDER_ID.to_string(),
            display_name: details.display_name.unwrap_or_else(|| folder.collection.clone()),
            folder_type: folder.kind,
        })
    }

    pub fn stat_folder(&self, folder_id: &str) -> BridgeResult<FolderStat> {
        tracing::debug!(folder_id, "stat_folder");
        let folder: FolderId = folder_id.parse()?;
        Ok(FolderStat::for_folder(&folder))
    }

    pub fn create_folder(&mut self, _parent_id: &str, _display_name: &str) -> BridgeResult<FolderStat> {
        Err(BridgeError::Unsupported("create_folder"))
    }

    pub fn rename_folder(&mut self, _folder_id: &str, _display_name: &str) -> BridgeResult<FolderStat> {
        Err(BridgeError::Unsupported("rename_folder"))
    }

    pub fn delete_folder(&mut self, _folder_id: &str) -> BridgeResult<bool> {
        Err(BridgeError::Unsupported("delete_folder"))
    }

    /// Fetch every item in `[since, far_future()]` and rebuild the session map.
    pub fn list_items(&mut self, folder_id: &str, since: DateTime<Utc>) -> BridgeResult<Vec<ItemStat>> {
        tracing::debug!(folder_id, since = %since, "list_items");
        let folder: FolderId = folder_id.parse()?;
        let collection = self.collection_href(&folder)?;

        let fetched =
            self.store
                .fetch_range(&collection, folder.kind.component(), since, far_future())?;

        self.items.clear();
        let mut stats = Vec::with_capacity(fetched.len());
        for item in fetched {
            stats.push(ItemStat::for_item(&item));
            self.items.insert(item.href.clone(), item);
        }

        tracing::debug!(folder_id, count = stats.len(), "Listed items");
        Ok(stats)
    }

    /// Stat an item from the session map, falling back to a lookup by the
    /// UID the id was named after. `None` when the item does not exist.
    pub fn stat_item(&self, folder_id: &str, id: &str) -> BridgeResult<Option<ItemStat>> {
        tracing::debug!(folder_id, id, "stat_item");
        Ok(self.find_item(folder_id, id)?.map(|item| ItemStat::for_item(&item)))
    }

    fn find_item(&self, folder_id: &str, id: &str) -> BridgeResult<Option<RemoteItem>> {
        let href = Href::new(id);
        if let Some(item) = self.items.get(&href) {
            return Ok(Some(item.clone()));
        }

        let folder: FolderId = folder_id.parse()?;
        let collection = self.collection_href(&folder)?;
        let found = self
            .store
            .fetch_by_uid(&collection, folder.kind.component(), href.resource_uid())?;

        if found.is_none() {
            tracing::debug!(folder_id, id, "Item not found on server");
        }
        Ok(found)
    }

    /// Decode an item into an appointment, with the body cut to `truncation` bytes.
    pub fn get_item(&self, folder_id: &str, id: &str, truncation: usize) -> BridgeResult<Appointment> {
        tracing::debug!(folder_id, id, "get_item");
        let folder: FolderId = folder_id.parse()?;
        if folder.kind == FolderKind::Tasks {
            return Err(BridgeError::Unsupported("task conversion"));
        }

        let item = self
            .find_item(folder_id, id)?
            .ok_or_else(|| BridgeError::ItemNotCached(id.to_string()))?;

        Ok(decode_appointment(&item.data, truncation, self.settings.default_timezone)?)
    }

    /// Create (`id` is `None`) or replace an appointment on the server.
    ///
    /// New items get an id built from the current time and a random hash and
    /// are only created if nothing exists at that href. Updates are
    /// conditional on the last known entity tag.
    pub fn write_item(
        &mut self,
        folder_id: &str,
        id: Option<&str>,
        appointment: &Appointment,
    ) -> BridgeResult<ItemStat> {
        tracing::debug!(folder_id, id, "write_item");
        let folder: FolderId = folder_id.parse()?;
        if folder.kind == FolderKind::Tasks {
            return Err(BridgeError::Unsupported("task conversion"));
        }
        let collection = self.collection_href(&folder)?;

        let (href, precondition) = match id {
            Some(id) => {
                let href = if Href::is_path(id) {
                    Href::new(id)
                } else {
                    collection.join(&format!("{id}.ics"))
                };
                let precondition = match self.stat_item(folder_id, href.as_str())? {
                    Some(ItemStat { etag: Some(etag), .. }) => Precondition::IfMatch(etag),
                    _ => Precondition::Unconditional,
                };
                (href, precondition)
            }
            None => {
                let new_id = format!("{}-{}", format_utc(&Utc::now()), Uuid::new_v4().simple());
                (collection.join(&format!("{new_id}.ics")), Precondition::CreateOnly)
            }
        };

        let uid = appointment
            .details
            .uid
            .clone()
            .unwrap_or_else(|| href.resource_uid().to_string());
        let data = encode_appointment(appointment, &uid, self.settings.default_timezone);

        let etag = self.store.put(&href, &data, &precondition)?;
        tracing::info!(href = %href, "Stored appointment");

        let item = RemoteItem { href, etag, data };
        let stat = ItemStat::for_item(&item);
        self.items.insert(item.href.clone(), item);
        Ok(stat)
    }

    /// Delete an item. Only a `204 No Content` answer counts as success.
    pub fn delete_item(&mut self, folder_id: &str, id: &str) -> BridgeResult<bool> {
        tracing::debug!(folder_id, id, "delete_item");
        self.home()?;

        let href = Href::new(id);
        let status = self.store.delete(&href)?;
        if status == 204 {
            self.items.remove(&href);
            Ok(true)
        } else {
            tracing::warn!(id, status, "Delete was not acknowledged");
            Ok(false)
        }
    }

    pub fn send_mail(&self) -> BridgeResult<()> {
        Err(BridgeError::Unsupported("send_mail"))
    }

    pub fn get_attachment_data(&self, _name: &str) -> BridgeResult<Vec<u8>> {
        Err(BridgeError::Unsupported("get_attachment_data"))
    }

    /// Deletes are permanent; there is no waste basket.
    pub fn get_waste_basket(&self) -> BridgeResult<String> {
        Err(BridgeError::Unsupported("get_waste_basket"))
    }

    pub fn set_read_flag(&mut self, _folder_id: &str, _id: &str, _read: bool) -> BridgeResult<()> {
        Err(BridgeError::Unsupported("set_read_flag"))
    }

    pub fn move_item(&mut self, _folder_id: &str, _id: &str, _new_folder_id: &str) -> BridgeResult<String> {
        Err(BridgeError::Unsupported("move_item"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CalendarCollection, ComponentKind};
    use calbridge_core::appointment::EventDetails;

    const STANDUP: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:standup\r\n\
SUMMARY:Standup\r\n\
DTSTART:20240315T090000Z\r\n\
DTEND:20240315T093000Z\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO,WE,FR\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    /// In-memory store holding one `work` calendar. Every stored version
    /// gets a fresh etag and puts honour their precondition.
    struct FakeStore {
        allow: Vec<String>,
        home: Option<Href>,
        items: Vec<(ComponentKind, RemoteItem)>,
        revision: u32,
        puts: Vec<(Href, String, Precondition)>,
        deleted: Vec<Href>,
        delete_status: u16,
    }

    impl Default for FakeStore {
        fn default() -> Self {
            FakeStore {
                allow: vec!["OPTIONS".into(), "GET".into(), "PROPFIND".into(), "REPORT".into()],
                home: None,
                items: Vec::new(),
                revision: 1,
                puts: Vec::new(),
                deleted: Vec::new(),
                delete_status: 204,
            }
        }
    }

    impl FakeStore {
        fn with_event(href: &str, data: &str) -> Self {
            FakeStore {
                items: vec![(
                    ComponentKind::Event,
                    RemoteItem {
                        href: Href::new(href),
                        etag: Some(ETag::new("\"v1\"")),
                        data: data.to_string(),
                    },
                )],
                ..Default::default()
            }
        }

        fn next_etag(&mut self) -> ETag {
            self.revision += 1;
            ETag::new(format!("\"v{}\"", self.revision))
        }

        fn position(&self, href: &Href) -> Option<usize> {
            self.items.iter().position(|(_, item)| item.href == *href)
        }

        /// Simulate an edit by another client.
        fn touch(&mut self, href: &str) {
            let etag = self.next_etag();
            let index = self.position(&Href::new(href)).expect("Should hold the touched item");
            self.items[index].1.etag = Some(etag);
        }
    }

    impl RemoteStore for FakeStore {
        fn login(&mut self, home: Href, _credentials: Credentials) {
            self.home = Some(home);
        }

        fn options(&self) -> BridgeResult<Vec<String>> {
            Ok(self.allow.clone())
        }

        fn list_collections(&self) -> BridgeResult<Vec<CalendarCollection>> {
            Ok(vec![CalendarCollection {
                href: Href::new("/calendars/jane/work/"),
                display_name: Some("Work".into()),
            }])
        }

        fn collection_details(&self, collection: &Href) -> BridgeResult<CalendarCollection> {
            Ok(CalendarCollection {
                href: collection.clone(),
                display_name: Some("Work".into()),
            })
        }

        fn fetch_range(
            &self,
            _collection: &Href,
            kind: ComponentKind,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> BridgeResult<Vec<RemoteItem>> {
            Ok(self
                .items
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, item)| item.clone())
                .collect())
        }

        fn fetch_by_uid(
            &self,
            _collection: &Href,
            kind: ComponentKind,
            uid: &str,
        ) -> BridgeResult<Option<RemoteItem>> {
            Ok(self
                .items
                .iter()
                .find(|(k, item)| *k == kind && item.href.resource_uid() == uid)
                .map(|(_, item)| item.clone()))
        }

        fn put(&mut self, href: &Href, data: &str, precondition: &Precondition) -> BridgeResult<Option<ETag>> {
            let current = self.position(href);
            let allowed = match (precondition, current) {
                (Precondition::CreateOnly, Some(_)) => false,
                (Precondition::IfMatch(expected), Some(index)) => {
                    self.items[index].1.etag.as_ref() == Some(expected)
                }
                (Precondition::IfMatch(_), None) => false,
                _ => true,
            };
            if !allowed {
                return Err(BridgeError::PreconditionFailed(href.to_string()));
            }

            let etag = self.next_etag();
            let item = RemoteItem {
                href: href.clone(),
                etag: Some(etag.clone()),
                data: data.to_string(),
            };
            match current {
                Some(index) => self.items[index].1 = item,
                None => self.items.push((ComponentKind::Event, item)),
            }
            self.puts.push((href.clone(), data.to_string(), precondition.clone()));
            Ok(Some(etag))
        }

        fn delete(&mut self, href: &Href) -> BridgeResult<u16> {
            self.deleted.push(href.clone());
            Ok(self.delete_status)
        }
    }

    fn logged_on(store: FakeStore) -> CalDavBackend<FakeStore> {
        let mut backend = CalDavBackend::new(
            store,
            BackendSettings {
                calendar_path: "/calendars/%u/".into(),
                default_timezone: Tz::UTC,
            },
        );
        assert!(backend.logon("jane", "secret"), "logon should succeed");
        backend
    }

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_logon_requires_propfind() {
        let mut store = FakeStore::with_event("/calendars/jane/work/standup.ics", STANDUP);
        store.allow = vec!["GET".into()];
        let mut backend = CalDavBackend::new(
            store,
            BackendSettings {
                calendar_path: "/calendars/%u/".into(),
                default_timezone: Tz::UTC,
            },
        );

        assert!(!backend.logon("jane", "wrong"));
        assert!(matches!(backend.list_folders(), Err(BridgeError::NotLoggedOn)));
        assert!(backend.logoff());
    }

    #[test]
    fn test_logon_substitutes_user_into_home() {
        let backend = logged_on(FakeStore::with_event("/calendars/jane/work/standup.ics", STANDUP));
        assert_eq!(backend.store.home, Some(Href::new("/calendars/jane/")));
    }

    #[test]
    fn test_folders_come_in_pairs() {
        let backend = logged_on(FakeStore::with_event("/calendars/jane/work/standup.ics", STANDUP));

        let folders = backend.list_folders().unwrap();
        let ids: Vec<_> = folders.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["Cwork", "Twork"]);
        assert!(folders.iter().all(|f| f.parent == "0"));

        let folder = backend.get_folder("Twork").unwrap();
        assert_eq!(folder.display_name, "Work");
        assert_eq!(folder.parent_id, "0");
        assert_eq!(folder.folder_type, FolderKind::Tasks);

        let stat = backend.stat_folder("Cwork").unwrap();
        assert_eq!(stat.modification, "Cwork");

        assert!(matches!(backend.get_folder("Zwork"), Err(BridgeError::InvalidFolderId(_))));
    }

    #[test]
    fn test_folder_changes_are_unsupported() {
        let mut backend = logged_on(FakeStore::default());
        assert!(matches!(backend.create_folder("0", "New"), Err(BridgeError::Unsupported(_))));
        assert!(matches!(backend.rename_folder("Cwork", "Old"), Err(BridgeError::Unsupported(_))));
        assert!(matches!(backend.delete_folder("Cwork"), Err(BridgeError::Unsupported(_))));
    }

    #[test]
    fn test_unsupported_surface() {
        let mut backend = logged_on(FakeStore::default());
        assert!(matches!(backend.send_mail(), Err(BridgeError::Unsupported(_))));
        assert!(matches!(backend.get_attachment_data("a"), Err(BridgeError::Unsupported(_))));
        assert!(matches!(backend.get_waste_basket(), Err(BridgeError::Unsupported(_))));
        assert!(matches!(backend.set_read_flag("Cwork", "x", true), Err(BridgeError::Unsupported(_))));
        assert!(matches!(backend.move_item("Cwork", "x", "Chome"), Err(BridgeError::Unsupported(_))));
    }

    #[test]
    fn test_list_stat_and_get_items() {
        let href = "/calendars/jane/work/standup.ics";
        let mut backend = logged_on(FakeStore::with_event(href, STANDUP));

        let stats = backend.list_items("Cwork", since()).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].id, href);
        assert_eq!(stats[0].flags, 1);
        assert_eq!(stats[0].etag, Some(ETag::new("\"v1\"")));

        // Tasks folder of the same calendar holds no VTODOs
        assert!(backend.list_items("Twork", since()).unwrap().is_empty());

        let stat = backend.stat_item("Cwork", href).unwrap().expect("Should stat");
        assert_eq!(stat.etag, Some(ETag::new("\"v1\"")));

        let appointment = backend.get_item("Cwork", href, 1024).unwrap();
        assert_eq!(appointment.details.subject.as_deref(), Some("Standup"));
    }

    #[test]
    fn test_stat_falls_back_to_uid_lookup() {
        let href = "/calendars/jane/work/standup.ics";
        let backend = logged_on(FakeStore::with_event(href, STANDUP));

        // Nothing listed yet, so the session map is empty
        let stat = backend.stat_item("Cwork", "standup.ics").unwrap().expect("Should find by UID");
        assert_eq!(stat.id, href);

        assert_eq!(backend.stat_item("Cwork", "missing.ics").unwrap(), None);
    }

    #[test]
    fn test_get_item_on_task_folder_is_unsupported() {
        let backend = logged_on(FakeStore::default());
        assert!(matches!(backend.get_item("Twork", "x", 10), Err(BridgeError::Unsupported(_))));
    }

    #[test]
    fn test_create_item_uses_create_only_precondition() {
        let mut backend = logged_on(FakeStore::default());
        let appointment = Appointment {
            details: EventDetails {
                subject: Some("Lunch".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let stat = backend.write_item("Cwork", None, &appointment).unwrap();
        assert_eq!(stat.etag, Some(ETag::new("\"v2\"")));

        let (href, data, precondition) = &backend.store.puts[0];
        assert_eq!(*precondition, Precondition::CreateOnly);
        assert_eq!(href.as_str(), stat.id);
        assert!(href.as_str().starts_with("/calendars/jane/work/"));

        // <YYYYMMDDTHHMMSSZ>-<32 hex>.ics
        let name = href.last_segment();
        let (stamp, rest) = name.split_once('-').expect("id should have a dash");
        assert_eq!(stamp.len(), 16);
        assert!(stamp.ends_with('Z'));
        let hash = rest.strip_suffix(".ics").expect("should end in .ics");
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

        assert!(data.contains(&format!("UID:{}\r\n", href.resource_uid())));

        // The new item is immediately visible to stat
        let again = backend.stat_item("Cwork", &stat.id).unwrap();
        assert_eq!(again, Some(stat));
    }

    #[test]
    fn test_update_item_uses_known_etag() {
        let href = "/calendars/jane/work/standup.ics";
        let mut backend = logged_on(FakeStore::with_event(href, STANDUP));
        backend.list_items("Cwork", since()).unwrap();

        let mut appointment = backend.get_item("Cwork", href, 1024).unwrap();
        appointment.details.subject = Some("Standup (moved)".into());

        let stat = backend.write_item("Cwork", Some(href), &appointment).unwrap();
        assert_eq!(stat.id, href);
        assert_eq!(stat.etag, Some(ETag::new("\"v2\"")), "Update should return the new etag");

        let (put_href, data, precondition) = &backend.store.puts[0];
        assert_eq!(put_href.as_str(), href);
        assert_eq!(*precondition, Precondition::IfMatch(ETag::new("\"v1\"")));
        assert!(data.contains("UID:standup\r\n"));
        assert!(data.contains("SUMMARY:Standup (moved)\r\n"));
    }

    #[test]
    fn test_update_with_bare_id_targets_collection() {
        let mut backend = logged_on(FakeStore::with_event("/calendars/jane/work/standup.ics", STANDUP));

        let stat = backend.write_item("Cwork", Some("standup"), &Appointment::default()).unwrap();
        assert_eq!(stat.id, "/calendars/jane/work/standup.ics");

        let (_, data, precondition) = &backend.store.puts[0];
        assert_eq!(*precondition, Precondition::IfMatch(ETag::new("\"v1\"")));
        assert!(data.contains("UID:standup\r\n"), "UID falls back to the id");
    }

    #[test]
    fn test_stale_write_is_surfaced() {
        let href = "/calendars/jane/work/standup.ics";
        let mut backend = logged_on(FakeStore::with_event(href, STANDUP));
        backend.list_items("Cwork", since()).unwrap();

        // Another client changes the event after we listed it
        backend.store.touch(href);

        let result = backend.write_item("Cwork", Some(href), &Appointment::default());
        assert!(
            matches!(result, Err(BridgeError::PreconditionFailed(_))),
            "Update with a stale etag should fail, got {result:?}"
        );
        assert!(backend.store.puts.is_empty(), "Rejected put must not be stored");
    }

    #[test]
    fn test_store_create_on_absent_path() {
        let mut store = FakeStore::default();
        let href = Href::new("/calendars/jane/work/new.ics");

        let etag = store
            .put(&href, STANDUP, &Precondition::CreateOnly)
            .expect("Should create an absent item");
        assert_eq!(etag, Some(ETag::new("\"v2\"")));

        let stored = store
            .fetch_by_uid(&Href::new("/calendars/jane/work/"), ComponentKind::Event, "new")
            .unwrap()
            .expect("Should find the created item");
        assert_eq!(stored.etag, etag);
    }

    #[test]
    fn test_store_create_only_rejects_existing_path() {
        let href = Href::new("/calendars/jane/work/standup.ics");
        let mut store = FakeStore::with_event(href.as_str(), STANDUP);

        let result = store.put(&href, "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n", &Precondition::CreateOnly);
        assert!(
            matches!(result, Err(BridgeError::PreconditionFailed(_))),
            "Create-only on an existing path should fail, got {result:?}"
        );
        assert_eq!(store.items[0].1.data, STANDUP, "Existing item must be untouched");
        assert_eq!(store.items[0].1.etag, Some(ETag::new("\"v1\"")));
    }

    #[test]
    fn test_store_update_needs_current_etag() {
        let href = Href::new("/calendars/jane/work/standup.ics");
        let mut store = FakeStore::with_event(href.as_str(), STANDUP);
        store.touch(href.as_str());

        let stale = store.put(&href, STANDUP, &Precondition::IfMatch(ETag::new("\"v1\"")));
        assert!(matches!(stale, Err(BridgeError::PreconditionFailed(_))), "got {stale:?}");

        let fresh = store
            .put(&href, STANDUP, &Precondition::IfMatch(ETag::new("\"v2\"")))
            .expect("Should accept the current etag");
        assert_eq!(fresh, Some(ETag::new("\"v3\"")));

        let missing = Href::new("/calendars/jane/work/gone.ics");
        let result = store.put(&missing, STANDUP, &Precondition::IfMatch(ETag::new("\"v3\"")));
        assert!(matches!(result, Err(BridgeError::PreconditionFailed(_))), "got {result:?}");
    }

    #[test]
    fn test_task_writes_are_unsupported() {
        let mut backend = logged_on(FakeStore::default());
        let result = backend.write_item("Twork", None, &Appointment::default());
        assert!(matches!(result, Err(BridgeError::Unsupported(_))));
        assert!(backend.store.puts.is_empty());
    }

    #[test]
    fn test_delete_only_succeeds_on_204() {
        let href = "/calendars/jane/work/standup.ics";
        let mut backend = logged_on(FakeStore::with_event(href, STANDUP));
        assert!(backend.delete_item("Cwork", href).unwrap());

        let mut store = FakeStore::with_event(href, STANDUP);
        store.delete_status = 200;
        let mut backend = logged_on(store);
        assert!(!backend.delete_item("Cwork", href).unwrap());
        assert_eq!(backend.store.deleted, vec![Href::new(href)]);
    }

    #[test]
    fn test_far_future_is_32_bit_limit() {
        assert_eq!(far_future(), Utc.with_ymd_and_hms(2038, 1, 19, 3, 14, 7).unwrap());
    }
}
