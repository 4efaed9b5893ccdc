use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Collection, NewLink, NewPage, PageChanges, PageStore, StoreError};
use crate::identity::{Caller, hash_edit_token};
use crate::metrics::{REORDER_APPLIED, REORDER_REJECTED};
use crate::models::{Link, OrderUpdate, Page};

#[derive(Default)]
struct Tables {
    // pages are stored without links; links are joined on read
    pages: HashMap<String, Page>,
    links: HashMap<String, Link>,
}

impl Tables {
    fn page(&self, id: &str) -> Result<&Page, StoreError> {
        self.pages.get(id).ok_or(StoreError::NotFound("Page"))
    }

    fn link(&self, id: &str) -> Result<&Link, StoreError> {
        self.links.get(id).ok_or(StoreError::NotFound("Link"))
    }

    fn with_links(&self, page: &Page) -> Page {
        let mut links: Vec<Link> = self
            .links
            .values()
            .filter(|l| l.page_id == page.id)
            .cloned()
            .collect();
        links.sort_by(|a, b| {
            (a.order, a.created_at, &a.id).cmp(&(b.order, b.created_at, &b.id))
        });
        Page {
            links,
            ..page.clone()
        }
    }

    fn next_page_order(&self, owner_id: Option<&str>) -> u32 {
        let Some(owner_id) = owner_id else {
            return 0;
        };
        self.pages
            .values()
            .filter(|p| p.owner_id.as_deref() == Some(owner_id))
            .map(|p| p.order + 1)
            .max()
            .unwrap_or(0)
    }

    fn next_link_order(&self, page_id: &str) -> u32 {
        self.links
            .values()
            .filter(|l| l.page_id == page_id)
            .map(|l| l.order + 1)
            .max()
            .unwrap_or(0)
    }
}

// Owner by session, or anonymous editor by edit token
fn can_edit(page: &Page, caller: &Caller) -> bool {
    let is_owner = matches!(
        (caller.user_id(), page.owner_id.as_deref()),
        (Some(user), Some(owner)) if user == owner
    );
    let is_anon_editor = caller
        .edit_token()
        .is_some_and(|token| hash_edit_token(token) == page.edit_token_hash);
    is_owner || is_anon_editor
}

fn is_owner(page: &Page, caller: &Caller) -> bool {
    matches!(
        (caller.user_id(), page.owner_id.as_deref()),
        (Some(user), Some(owner)) if user == owner
    )
}

fn sort_pages(pages: &mut [Page]) {
    pages.sort_by(|a, b| (a.order, a.created_at, &a.id).cmp(&(b.order, b.created_at, &b.id)));
}

/// Single-process store. One lock guards both tables so a batch commits as
/// one unit.
#[derive(Default)]
pub struct MemoryPageStore {
    tables: RwLock<Tables>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Check every row of the batch before touching any of them
    fn stage_batch(
        tables: &Tables,
        caller: &Caller,
        collection: &Collection,
        items: &[OrderUpdate],
    ) -> Result<Vec<(String, u32)>, StoreError> {
        let mut seen_ids = HashSet::new();
        let mut seen_orders = HashSet::new();
        let mut staged = Vec::with_capacity(items.len());

        if let Collection::Links { page_id } = collection {
            let page = tables.page(page_id)?;
            if !can_edit(page, caller) {
                return Err(StoreError::Unauthorized);
            }
        } else if !caller.is_authenticated() {
            return Err(StoreError::Unauthorized);
        }

        for item in items {
            match collection {
                Collection::Links { page_id } => {
                    let link = tables.link(&item.id)?;
                    if link.page_id != *page_id {
                        let parent = tables.page(&link.page_id)?;
                        if !can_edit(parent, caller) {
                            return Err(StoreError::Unauthorized);
                        }
                        return Err(StoreError::Constraint(format!(
                            "link {} belongs to another page",
                            item.id
                        )));
                    }
                }
                Collection::Pages => {
                    let page = tables.page(&item.id)?;
                    if !is_owner(page, caller) {
                        return Err(StoreError::Unauthorized);
                    }
                }
            }

            if !seen_ids.insert(item.id.as_str()) {
                return Err(StoreError::Constraint(format!("duplicate id {}", item.id)));
            }
            if !seen_orders.insert(item.order) {
                return Err(StoreError::Constraint(format!(
                    "duplicate order {}",
                    item.order
                )));
            }
            staged.push((item.id.clone(), item.order));
        }
        Ok(staged)
    }
}

#[async_trait]
impl PageStore for MemoryPageStore {
    async fn create_page(&self, new: NewPage) -> Result<Page, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.pages.values().any(|p| p.alias == new.alias) {
            return Err(StoreError::AliasTaken);
        }

        let page = Page {
            id: Uuid::new_v4().to_string(),
            order: tables.next_page_order(new.owner_id.as_deref()),
            alias: new.alias,
            title: new.title,
            description: new.description,
            is_public: true,
            owner_id: new.owner_id,
            edit_token_hash: new.edit_token_hash,
            created_at: Utc::now(),
            links: Vec::new(),
        };
        tables.pages.insert(page.id.clone(), page.clone());
        debug!(page_id = %page.id, alias = %page.alias, "page created");
        Ok(page)
    }

    async fn page_by_id(&self, id: &str) -> Result<Page, StoreError> {
        let tables = self.tables.read().await;
        let page = tables.page(id)?;
        Ok(tables.with_links(page))
    }

    async fn page_by_alias(&self, alias: &str) -> Result<Page, StoreError> {
        let tables = self.tables.read().await;
        let page = tables
            .pages
            .values()
            .find(|p| p.alias == alias)
            .ok_or(StoreError::NotFound("Page"))?;
        Ok(tables.with_links(page))
    }

    async fn pages_for(&self, caller: &Caller) -> Result<Vec<Page>, StoreError> {
        let tables = self.tables.read().await;
        let mut pages: Vec<Page> = match caller {
            Caller::Authenticated { user_id, .. } => tables
                .pages
                .values()
                .filter(|p| p.owner_id.as_deref() == Some(user_id.as_str()))
                .map(|p| tables.with_links(p))
                .collect(),
            Caller::Anonymous { edit_token: Some(token) } => {
                let digest = hash_edit_token(token);
                tables
                    .pages
                    .values()
                    .filter(|p| p.edit_token_hash == digest)
                    .map(|p| tables.with_links(p))
                    .collect()
            }
            Caller::Anonymous { edit_token: None } => Vec::new(),
        };
        sort_pages(&mut pages);
        Ok(pages)
    }

    async fn update_page(
        &self,
        caller: &Caller,
        id: &str,
        changes: PageChanges,
    ) -> Result<Page, StoreError> {
        let mut tables = self.tables.write().await;
        if !can_edit(tables.page(id)?, caller) {
            return Err(StoreError::Unauthorized);
        }

        let page = tables.pages.get_mut(id).ok_or(StoreError::NotFound("Page"))?;
        if let Some(title) = changes.title {
            page.title = Some(title);
        }
        if let Some(description) = changes.description {
            page.description = Some(description);
        }
        if let Some(is_public) = changes.is_public {
            page.is_public = is_public;
        }
        let page = page.clone();
        Ok(tables.with_links(&page))
    }

    async fn delete_page(&self, caller: &Caller, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !can_edit(tables.page(id)?, caller) {
            return Err(StoreError::Unauthorized);
        }
        tables.pages.remove(id);
        tables.links.retain(|_, link| link.page_id != id);
        debug!(page_id = id, "page deleted");
        Ok(())
    }

    async fn attach_page(&self, caller: &Caller, id: &str) -> Result<Page, StoreError> {
        let user_id = caller.user_id().ok_or(StoreError::Unauthorized)?.to_string();
        let mut tables = self.tables.write().await;
        let page = tables.page(id)?;
        if page.owner_id.is_some() {
            return Err(StoreError::AlreadyOwned);
        }
        // only the holder of the page's edit token may claim it
        if !can_edit(page, caller) {
            return Err(StoreError::Unauthorized);
        }

        let order = tables.next_page_order(Some(&user_id));
        let page = tables.pages.get_mut(id).ok_or(StoreError::NotFound("Page"))?;
        page.owner_id = Some(user_id);
        page.order = order;
        let page = page.clone();
        Ok(tables.with_links(&page))
    }

    async fn create_link(&self, caller: &Caller, new: NewLink) -> Result<Link, StoreError> {
        let mut tables = self.tables.write().await;
        if !can_edit(tables.page(&new.page_id)?, caller) {
            return Err(StoreError::Unauthorized);
        }

        let link = Link {
            id: Uuid::new_v4().to_string(),
            order: tables.next_link_order(&new.page_id),
            page_id: new.page_id,
            title: new.title,
            url: new.url,
            created_at: Utc::now(),
        };
        tables.links.insert(link.id.clone(), link.clone());
        Ok(link)
    }

    async fn update_link(
        &self,
        caller: &Caller,
        id: &str,
        title: String,
        url: String,
    ) -> Result<Link, StoreError> {
        let mut tables = self.tables.write().await;
        let page_id = tables.link(id)?.page_id.clone();
        // editing requires the signed-in owner, edit tokens are not enough
        if !is_owner(tables.page(&page_id)?, caller) {
            return Err(StoreError::Unauthorized);
        }

        let link = tables.links.get_mut(id).ok_or(StoreError::NotFound("Link"))?;
        link.title = title;
        link.url = url;
        Ok(link.clone())
    }

    async fn delete_link(&self, caller: &Caller, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let page_id = tables.link(id)?.page_id.clone();
        if !can_edit(tables.page(&page_id)?, caller) {
            return Err(StoreError::Unauthorized);
        }
        tables.links.remove(id);
        Ok(())
    }

    async fn find_owned_collection(
        &self,
        caller: &Caller,
        collection: &Collection,
    ) -> Result<Vec<String>, StoreError> {
        match collection {
            Collection::Links { page_id } => {
                let tables = self.tables.read().await;
                let page = tables.page(page_id)?;
                if !can_edit(page, caller) {
                    return Err(StoreError::Unauthorized);
                }
                Ok(tables.with_links(page).links.into_iter().map(|l| l.id).collect())
            }
            Collection::Pages => {
                if !caller.is_authenticated() {
                    return Err(StoreError::Unauthorized);
                }
                let pages = self.pages_for(caller).await?;
                Ok(pages.into_iter().map(|p| p.id).collect())
            }
        }
    }

    async fn apply_order_batch(
        &self,
        caller: &Caller,
        collection: &Collection,
        items: &[OrderUpdate],
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let staged = match Self::stage_batch(&tables, caller, collection, items) {
            Ok(staged) => staged,
            Err(err) => {
                REORDER_REJECTED.inc();
                warn!(error = %err, items = items.len(), "order batch rejected");
                return Err(err);
            }
        };

        // validated above; the write lock is still held
        for (id, order) in staged {
            match collection {
                Collection::Links { .. } => {
                    if let Some(link) = tables.links.get_mut(&id) {
                        link.order = order;
                    }
                }
                Collection::Pages => {
                    if let Some(page) = tables.pages.get_mut(&id) {
                        page.order = order;
                    }
                }
            }
        }
        REORDER_APPLIED.inc();
        debug!(items = items.len(), "order batch applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_page(alias: &str, owner: Option<&str>, token: &str) -> NewPage {
        NewPage {
            alias: alias.to_string(),
            title: None,
            description: None,
            owner_id: owner.map(str::to_string),
            edit_token_hash: hash_edit_token(token),
        }
    }

    async fn page_with_links(store: &MemoryPageStore, owner: &Caller, n: usize) -> Page {
        let page = store
            .create_page(new_page("home", owner.user_id(), "tok"))
            .await
            .unwrap();
        for i in 0..n {
            store
                .create_link(
                    owner,
                    NewLink {
                        page_id: page.id.clone(),
                        title: format!("link {i}"),
                        url: format!("https://example.com/{i}"),
                    },
                )
                .await
                .unwrap();
        }
        store.page_by_id(&page.id).await.unwrap()
    }

    fn titles(page: &Page) -> Vec<String> {
        page.links.iter().map(|l| l.title.clone()).collect()
    }

    #[tokio::test]
    async fn links_get_next_position() {
        let store = MemoryPageStore::new();
        let alice = Caller::user("alice");
        let page = page_with_links(&store, &alice, 3).await;
        let orders: Vec<u32> = page.links.iter().map(|l| l.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn reorder_links_applies_all() {
        let store = MemoryPageStore::new();
        let alice = Caller::user("alice");
        let page = page_with_links(&store, &alice, 3).await;

        let batch: Vec<OrderUpdate> = page
            .links
            .iter()
            .rev()
            .enumerate()
            .map(|(i, l)| OrderUpdate { id: l.id.clone(), order: i as u32 })
            .collect();
        store
            .apply_order_batch(&alice, &Collection::Links { page_id: page.id.clone() }, &batch)
            .await
            .unwrap();

        let page = store.page_by_id(&page.id).await.unwrap();
        assert_eq!(titles(&page), vec!["link 2", "link 1", "link 0"]);
    }

    #[tokio::test]
    async fn foreign_item_rejects_whole_batch() {
        let store = MemoryPageStore::new();
        let alice = Caller::user("alice");
        let bob = Caller::user("bob");
        let mine = page_with_links(&store, &alice, 2).await;

        let theirs = store
            .create_page(new_page("bob", Some("bob"), "bob-tok"))
            .await
            .unwrap();
        let foreign = store
            .create_link(
                &bob,
                NewLink {
                    page_id: theirs.id.clone(),
                    title: "bob link".into(),
                    url: "https://bob.example".into(),
                },
            )
            .await
            .unwrap();

        let batch = vec![
            OrderUpdate { id: mine.links[1].id.clone(), order: 0 },
            OrderUpdate { id: mine.links[0].id.clone(), order: 1 },
            OrderUpdate { id: foreign.id.clone(), order: 2 },
        ];
        let err = store
            .apply_order_batch(&alice, &Collection::Links { page_id: mine.id.clone() }, &batch)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Unauthorized);

        let after = store.page_by_id(&mine.id).await.unwrap();
        assert_eq!(titles(&after), vec!["link 0", "link 1"]);
        assert_eq!(store.page_by_id(&theirs.id).await.unwrap().links[0].order, 0);
    }

    #[tokio::test]
    async fn non_owner_cannot_reorder() {
        let store = MemoryPageStore::new();
        let alice = Caller::user("alice");
        let page = page_with_links(&store, &alice, 2).await;

        let batch = vec![
            OrderUpdate { id: page.links[1].id.clone(), order: 0 },
            OrderUpdate { id: page.links[0].id.clone(), order: 1 },
        ];
        let err = store
            .apply_order_batch(
                &Caller::user("mallory"),
                &Collection::Links { page_id: page.id.clone() },
                &batch,
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Unauthorized);
    }

    #[tokio::test]
    async fn constraint_violation_mid_batch_changes_nothing() {
        let store = MemoryPageStore::new();
        let alice = Caller::user("alice");
        let page = page_with_links(&store, &alice, 10).await;

        // reversed order, but the 7th row repeats the 1st row's order
        let mut batch: Vec<OrderUpdate> = page
            .links
            .iter()
            .enumerate()
            .map(|(i, l)| OrderUpdate { id: l.id.clone(), order: 9 - i as u32 })
            .collect();
        batch[6].order = batch[0].order;

        let err = store
            .apply_order_batch(&alice, &Collection::Links { page_id: page.id.clone() }, &batch)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        let after = store.page_by_id(&page.id).await.unwrap();
        assert_eq!(after, page);
    }

    #[tokio::test]
    async fn anonymous_editor_uses_token() {
        let store = MemoryPageStore::new();
        let page = store.create_page(new_page("anon", None, "secret")).await.unwrap();

        let editor = Caller::anonymous(Some("secret".into()));
        let stranger = Caller::anonymous(Some("guess".into()));
        let link = NewLink {
            page_id: page.id.clone(),
            title: "hi".into(),
            url: "https://hi.example".into(),
        };

        assert_eq!(
            store.create_link(&stranger, link.clone()).await.unwrap_err(),
            StoreError::Unauthorized
        );
        let created = store.create_link(&editor, link).await.unwrap();

        // editing a link needs the signed-in owner
        assert_eq!(
            store
                .update_link(&editor, &created.id, "x".into(), "https://x.example".into())
                .await
                .unwrap_err(),
            StoreError::Unauthorized
        );
        assert_eq!(store.pages_for(&editor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn attach_claims_once() {
        let store = MemoryPageStore::new();
        let page = store.create_page(new_page("anon", None, "secret")).await.unwrap();

        // knowing the id is not enough
        assert_eq!(
            store.attach_page(&Caller::user("mallory"), &page.id).await.unwrap_err(),
            StoreError::Unauthorized
        );
        let wrong_token = Caller::Authenticated {
            user_id: "mallory".into(),
            edit_token: Some("guess".into()),
        };
        assert_eq!(
            store.attach_page(&wrong_token, &page.id).await.unwrap_err(),
            StoreError::Unauthorized
        );

        let alice = Caller::Authenticated {
            user_id: "alice".into(),
            edit_token: Some("secret".into()),
        };
        let attached = store.attach_page(&alice, &page.id).await.unwrap();
        assert_eq!(attached.owner_id.as_deref(), Some("alice"));
        let bob = Caller::Authenticated {
            user_id: "bob".into(),
            edit_token: Some("secret".into()),
        };
        assert_eq!(
            store.attach_page(&bob, &page.id).await.unwrap_err(),
            StoreError::AlreadyOwned
        );
        assert_eq!(
            store.attach_page(&Caller::anonymous(None), &page.id).await.unwrap_err(),
            StoreError::Unauthorized
        );
    }

    #[tokio::test]
    async fn reorder_pages_for_owner() {
        let store = MemoryPageStore::new();
        let alice = Caller::user("alice");
        let a = store.create_page(new_page("a", Some("alice"), "1")).await.unwrap();
        let b = store.create_page(new_page("b", Some("alice"), "2")).await.unwrap();
        assert_eq!((a.order, b.order), (0, 1));

        let batch = vec![
            OrderUpdate { id: b.id.clone(), order: 0 },
            OrderUpdate { id: a.id.clone(), order: 1 },
        ];
        store.apply_order_batch(&alice, &Collection::Pages, &batch).await.unwrap();

        let ids = store.find_owned_collection(&alice, &Collection::Pages).await.unwrap();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn duplicate_alias_rejected() {
        let store = MemoryPageStore::new();
        store.create_page(new_page("taken", None, "1")).await.unwrap();
        assert_eq!(
            store.create_page(new_page("taken", None, "2")).await.unwrap_err(),
            StoreError::AliasTaken
        );
    }
}
