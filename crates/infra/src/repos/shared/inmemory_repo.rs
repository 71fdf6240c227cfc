use partner_sync_domain::{Entity, ID};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Useful functions for creating inmemory repositories

pub fn lock<T>(collection: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    collection.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn insert<T: Clone>(val: &T, collection: &Mutex<Vec<T>>) {
    lock(collection).push(val.clone());
}

pub fn save<T: Clone + Entity>(val: &T, collection: &Mutex<Vec<T>>) {
    let mut collection = lock(collection);
    for item in collection.iter_mut() {
        if item.id() == val.id() {
            *item = val.clone();
        }
    }
}

pub fn find<T: Clone + Entity>(val_id: &ID, collection: &Mutex<Vec<T>>) -> Option<T> {
    lock(collection)
        .iter()
        .find(|item| item.id() == val_id)
        .cloned()
}

pub fn find_by<T: Clone, F: FnMut(&T) -> bool>(collection: &Mutex<Vec<T>>, mut compare: F) -> Vec<T> {
    lock(collection)
        .iter()
        .filter(|item| compare(*item))
        .cloned()
        .collect()
}

pub fn delete<T: Clone + Entity>(val_id: &ID, collection: &Mutex<Vec<T>>) -> Option<T> {
    let mut collection = lock(collection);
    let index = collection.iter().position(|item| item.id() == val_id)?;
    Some(collection.remove(index))
}

pub fn find_and_delete_by<T, F: Fn(&T) -> bool>(collection: &Mutex<Vec<T>>, compare: F) -> Vec<T> {
    let mut collection = lock(collection);
    let mut deleted_items = Vec::new();
    let mut i = 0;
    while i < collection.len() {
        if compare(&collection[i]) {
            deleted_items.push(collection.remove(i));
        } else {
            i += 1;
        }
    }
    deleted_items
}

pub fn update_many<T, F: Fn(&T) -> bool, U: FnMut(&mut T)>(
    collection: &Mutex<Vec<T>>,
    compare: F,
    mut update: U,
) -> Vec<T>
where
    T: Clone,
{
    let mut collection = lock(collection);
    let mut updated = Vec::new();
    for item in collection.iter_mut() {
        if compare(item) {
            update(item);
            updated.push(item.clone());
        }
    }
    updated
}
