use super::{Address, Area, Listing, Money, RoomInfo, Seller};

/// Gap-only merge: keeps every known value of `self` and takes a value
/// from `other` only where `self` has none.
pub trait FillGaps: Sized {
    fn fill_gaps(self, other: Self) -> Self;
}

impl<T: FillGaps> FillGaps for Option<T> {
    fn fill_gaps(self, other: Self) -> Self {
        match (self, other) {
            (Some(known), Some(candidate)) => Some(known.fill_gaps(candidate)),
            (known, candidate) => known.or(candidate),
        }
    }
}

impl FillGaps for Money {
    fn fill_gaps(self, other: Self) -> Self {
        Money {
            amount: self.amount.or(other.amount),
            currency: self.currency.or(other.currency),
        }
    }
}

// The unit belongs to the value, so an area is taken whole.
impl FillGaps for Area {
    fn fill_gaps(self, other: Self) -> Self {
        if self.value.is_some() || other.value.is_none() {
            self
        } else {
            other
        }
    }
}

impl FillGaps for RoomInfo {
    fn fill_gaps(self, other: Self) -> Self {
        RoomInfo {
            rooms: self.rooms.or(other.rooms),
            bedrooms: self.bedrooms.or(other.bedrooms),
            bathrooms: self.bathrooms.or(other.bathrooms),
        }
    }
}

impl FillGaps for Address {
    fn fill_gaps(self, other: Self) -> Self {
        Address {
            country: self.country.or(other.country),
            region: self.region.or(other.region),
            city: self.city.or(other.city),
            district: self.district.or(other.district),
            street: self.street.or(other.street),
            house_number: self.house_number.or(other.house_number),
            postal_code: self.postal_code.or(other.postal_code),
            formatted: self.formatted.or(other.formatted),
            latitude: self.latitude.or(other.latitude),
            longitude: self.longitude.or(other.longitude),
        }
    }
}

impl FillGaps for Seller {
    fn fill_gaps(self, other: Self) -> Self {
        Seller {
            name: self.name.or(other.name),
            phone: self.phone.or(other.phone),
            email: self.email.or(other.email),
            kind: self.kind.or(other.kind),
        }
    }
}

fn non_empty<T>(known: Option<Vec<T>>, candidate: Option<Vec<T>>) -> Option<Vec<T>> {
    match known {
        Some(items) if !items.is_empty() => Some(items),
        _ => candidate.or(known),
    }
}

impl FillGaps for Listing {
    fn fill_gaps(self, other: Self) -> Self {
        Listing {
            id: self.id.or(other.id),
            url: self.url.or(other.url),
            title: self.title.or(other.title),
            description: self.description.or(other.description),
            price: self.price.fill_gaps(other.price),
            price_per_area: self.price_per_area.fill_gaps(other.price_per_area),
            area: self.area.fill_gaps(other.area),
            lot_area: self.lot_area.fill_gaps(other.lot_area),
            floor: self.floor.or(other.floor),
            total_floors: self.total_floors.or(other.total_floors),
            year_built: self.year_built.or(other.year_built),
            property_type: self.property_type.or(other.property_type),
            transaction_type: self.transaction_type.or(other.transaction_type),
            furnished: self.furnished.or(other.furnished),
            condition: self.condition.or(other.condition),
            rooms: self.rooms.fill_gaps(other.rooms),
            address: self.address.fill_gaps(other.address),
            amenities: non_empty(self.amenities, other.amenities),
            media: non_empty(self.media, other.media),
            images: non_empty(self.images, other.images),
            seller: self.seller.fill_gaps(other.seller),
            source: self.source.or(other.source),
            raw: self.raw.or(other.raw),
        }
    }
}
